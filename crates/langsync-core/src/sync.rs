#![forbid(unsafe_code)]

//! The per-page sync instance.
//!
//! [`LanguageSync`] owns the active language and every collaborator: the
//! preference store, the related-window registry, the page sink and the
//! clock. A host constructs exactly one per page and routes browser events
//! into it. Nothing here blocks or schedules; where a timer is needed the
//! instance returns the delay and the host calls back.
//!
//! # Lifecycle
//!
//! `Uninitialized -> Initializing -> Active`
//!
//! [`start`](LanguageSync::start) resolves and renders the initial language
//! and enters `Initializing`. Inbound messages are honoured right away, but
//! the first broadcast waits until the host calls
//! [`complete_initialization`](LanguageSync::complete_initialization) after
//! the returned delay, so pages loading at the same time do not race each
//! other with their defaults.

use tracing::{debug, info, trace};
use web_time::Duration;

use crate::applier::{PageSink, UiApplier};
use crate::broadcast::{BroadcastReport, Broadcaster, TargetRegistry, WindowHandle};
use crate::clock::{Clock, SystemClock};
use crate::config::SyncConfig;
use crate::language::LanguageCode;
use crate::message::{Inbound, MessageKind, SyncMessage};
use crate::receiver::{Action, Disposition, IgnoreReason, Receiver};
use crate::reconnect::ReconnectSchedule;
use crate::store::{PersistReport, PreferenceSource, PreferenceStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Initializing,
    Active,
}

/// What [`LanguageSync::start`] decided and what the host must schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartPlan {
    pub language: LanguageCode,
    pub source: PreferenceSource,
    /// Call [`LanguageSync::complete_initialization`] after this delay.
    pub broadcast_after: Duration,
}

pub struct LanguageSync<W, P> {
    config: SyncConfig,
    source: String,
    phase: Phase,
    store: PreferenceStore,
    targets: TargetRegistry<W>,
    broadcaster: Broadcaster,
    receiver: Receiver,
    applier: UiApplier<P>,
    clock: Box<dyn Clock>,
    reconnect: Option<ReconnectSchedule>,
}

impl<W: core::fmt::Debug, P: core::fmt::Debug> core::fmt::Debug for LanguageSync<W, P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LanguageSync")
            .field("source", &self.source)
            .field("phase", &self.phase)
            .field("current", &self.applier.active())
            .field("store", &self.store)
            .field("targets", &self.targets)
            .field("reconnect", &self.reconnect)
            .finish_non_exhaustive()
    }
}

impl<W: WindowHandle, P: PageSink> LanguageSync<W, P> {
    /// New instance in `Uninitialized` with an in-memory-only store, no
    /// related windows and the system clock.
    ///
    /// `config` is expected to have passed [`SyncConfig::validate`].
    pub fn new(config: SyncConfig, page: P) -> Self {
        let store = PreferenceStore::new(&config);
        let broadcaster = Broadcaster::new(config.trusted_origin.clone());
        let receiver = Receiver::new(
            config.trusted_origin.clone(),
            config.storage_key.clone(),
            config.languages.clone(),
        );
        let applier = UiApplier::new(page, config.languages.default_language());
        Self {
            config,
            source: String::new(),
            phase: Phase::Uninitialized,
            store,
            targets: TargetRegistry::default(),
            broadcaster,
            receiver,
            applier,
            clock: Box::new(SystemClock),
            reconnect: None,
        }
    }

    #[must_use]
    pub fn with_store(mut self, store: PreferenceStore) -> Self {
        self.store = store;
        self
    }

    #[must_use]
    pub fn with_targets(mut self, targets: TargetRegistry<W>) -> Self {
        self.targets = targets;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Identifier carried in the `source` field of outgoing messages.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn current_language(&self) -> LanguageCode {
        self.applier.active()
    }

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn page(&self) -> &P {
        self.applier.page()
    }

    pub fn targets(&self) -> &TargetRegistry<W> {
        &self.targets
    }

    /// Track a window this page opened so it receives broadcasts.
    pub fn register_window(&mut self, window: W) {
        self.targets.register_window(window);
    }

    /// Track a same-page iframe so it receives broadcasts.
    pub fn register_frame(&mut self, frame: W) {
        self.targets.register_frame(frame);
    }

    /// Resolve the initial language, render it and enter `Initializing`.
    ///
    /// Returns `None` if the instance was already started.
    pub fn start(&mut self, browser_locale: Option<&str>) -> Option<StartPlan> {
        if self.phase != Phase::Uninitialized {
            debug!(phase = ?self.phase, "start called twice");
            return None;
        }
        let resolution = self.store.resolve(&self.config.languages, browser_locale);
        self.phase = Phase::Initializing;
        self.applier.apply(resolution.language);
        info!(
            language = %resolution.language,
            source = ?resolution.source,
            "language sync initializing"
        );
        Some(StartPlan {
            language: resolution.language,
            source: resolution.source,
            broadcast_after: self.config.initial_broadcast_delay(),
        })
    }

    /// Enter `Active` and announce the current language to related contexts
    /// and sibling tabs.
    ///
    /// Returns `None` unless the instance was `Initializing`.
    pub fn complete_initialization(&mut self) -> Option<BroadcastReport> {
        if self.phase != Phase::Initializing {
            return None;
        }
        self.phase = Phase::Active;
        if self.targets.has_upstream() {
            self.reconnect = self.config.reconnect.clone().map(ReconnectSchedule::new);
        }
        Some(self.broadcast(self.current_language()))
    }

    /// User picked a language (selector change, API call).
    ///
    /// Unsupported codes are ignored and the current language is kept.
    pub fn change_language(&mut self, raw: &str) -> Disposition {
        if self.phase == Phase::Uninitialized {
            return Disposition::Ignored(IgnoreReason::NotStarted);
        }
        match self.config.languages.accept(raw) {
            Some(language) => self.apply_and_broadcast(language),
            None => {
                debug!(language = raw, "ignoring unsupported selection");
                Disposition::Ignored(IgnoreReason::UnsupportedLanguage)
            }
        }
    }

    /// Local change: apply, persist, and tell every related context.
    ///
    /// While `Initializing` the broadcast is deferred to
    /// [`complete_initialization`](Self::complete_initialization), which
    /// announces whatever is current at that point.
    pub fn apply_and_broadcast(&mut self, language: LanguageCode) -> Disposition {
        if !self.applier.apply(language) {
            return Disposition::Ignored(IgnoreReason::SameLanguage);
        }
        let persisted = self.store.persist(language);
        log_persist(&persisted);
        if self.phase == Phase::Active {
            let message = self.message(MessageKind::Change, Some(language));
            self.broadcaster.broadcast(&mut self.targets, &message);
        } else {
            trace!(%language, "broadcast deferred until initialization completes");
        }
        Disposition::Applied(language)
    }

    /// Remote change: apply locally only. Never posts or writes storage.
    pub fn apply_without_rebroadcast(&mut self, language: LanguageCode) -> Disposition {
        if self.applier.apply(language) {
            Disposition::Applied(language)
        } else {
            Disposition::Ignored(IgnoreReason::SameLanguage)
        }
    }

    /// Handle a decoded message from another context.
    pub fn handle_message(&mut self, inbound: Inbound<W>) -> Disposition {
        if self.phase == Phase::Uninitialized {
            return Disposition::Ignored(IgnoreReason::NotStarted);
        }
        let current = self.current_language();
        let decision = self
            .receiver
            .decide_message(&inbound.origin, &inbound.message, current);
        if decision.peer_answered {
            if let Some(schedule) = self.reconnect.as_mut() {
                schedule.mark_connected();
            }
        }
        match decision.action {
            Action::Apply(language) => {
                debug!(
                    %language,
                    kind = ?inbound.message.kind,
                    source = %inbound.message.source,
                    "received language from related context"
                );
                self.apply_without_rebroadcast(language)
            }
            Action::Reply(kind) => self.reply(kind, inbound.reply_to.as_ref()),
            Action::Ignore(reason) => Disposition::Ignored(reason),
        }
    }

    /// Handle an undecoded payload. The origin check runs before decoding so
    /// junk from untrusted pages is dropped without a trace beyond `trace!`.
    pub fn handle_raw_message(
        &mut self,
        origin: &str,
        reply_to: Option<W>,
        payload: &str,
    ) -> Disposition {
        if !self.receiver.is_trusted(origin) {
            trace!(origin, "dropping payload from untrusted origin");
            return Disposition::Ignored(IgnoreReason::UntrustedOrigin);
        }
        match SyncMessage::from_json(payload) {
            Ok(message) => self.handle_message(Inbound::new(origin, reply_to, message)),
            Err(err) => {
                trace!(error = %err, "ignoring non-sync message");
                Disposition::Ignored(IgnoreReason::Malformed)
            }
        }
    }

    /// Handle a storage change notification from a sibling tab.
    pub fn handle_storage_event(
        &mut self,
        key: Option<&str>,
        new_value: Option<&str>,
    ) -> Disposition {
        if self.phase == Phase::Uninitialized {
            return Disposition::Ignored(IgnoreReason::NotStarted);
        }
        match self
            .receiver
            .decide_storage(key, new_value, self.current_language())
        {
            Action::Apply(language) => {
                debug!(%language, "received language from sibling tab");
                self.apply_without_rebroadcast(language)
            }
            Action::Reply(_) => Disposition::Ignored(IgnoreReason::UnknownKind),
            Action::Ignore(reason) => Disposition::Ignored(reason),
        }
    }

    /// Page regained focus or became visible: ask upstream for its language.
    pub fn on_focus(&mut self) -> Option<BroadcastReport> {
        if self.phase == Phase::Uninitialized || !self.config.handshake_on_focus {
            return None;
        }
        if !self.targets.has_upstream() {
            return None;
        }
        let message = self.message(MessageKind::Handshake, None);
        Some(self.broadcaster.send_upstream(&self.targets, &message))
    }

    /// Delay before the next reconnect tick, if one should be scheduled.
    #[must_use]
    pub fn reconnect_delay(&self) -> Option<Duration> {
        self.reconnect.as_ref().and_then(ReconnectSchedule::next_delay)
    }

    /// Reconnect timer fired: send `SYNC_REQUEST` upstream.
    ///
    /// Returns `None` once a peer answered, the attempts ran out, or no
    /// upstream context is left.
    pub fn on_reconnect_tick(&mut self) -> Option<BroadcastReport> {
        if !self.targets.has_upstream() {
            self.reconnect = None;
            return None;
        }
        let schedule = self.reconnect.as_mut()?;
        if !schedule.record_attempt() {
            return None;
        }
        let attempt = schedule.attempts();
        trace!(attempt, "requesting language from upstream");
        let message = self.message(MessageKind::SyncRequest, None);
        Some(self.broadcaster.send_upstream(&self.targets, &message))
    }

    fn broadcast(&mut self, language: LanguageCode) -> BroadcastReport {
        let message = self.message(MessageKind::Change, Some(language));
        let report = self.broadcaster.broadcast(&mut self.targets, &message);
        log_persist(&self.store.persist_storage(language));
        report
    }

    fn reply(&mut self, kind: MessageKind, reply_to: Option<&W>) -> Disposition {
        let Some(target) = reply_to else {
            trace!(?kind, "request without reply target");
            return Disposition::Ignored(IgnoreReason::NoReplyTarget);
        };
        let language = self.current_language();
        let message = self.message(kind, Some(language));
        match self.broadcaster.send_to(target, &message) {
            Ok(()) => Disposition::Replied { kind, language },
            Err(err) => {
                debug!(error = %err, "reply to requester failed");
                Disposition::ReplyFailed(err)
            }
        }
    }

    fn message(&self, kind: MessageKind, language: Option<LanguageCode>) -> SyncMessage {
        SyncMessage::new(kind, self.source.clone(), language, self.clock.now_ms())
    }
}

fn log_persist(report: &PersistReport) {
    if !report.is_clean() {
        debug!(
            failed = report.failures.len(),
            written = report.written.len(),
            "preference only partially persisted"
        );
    }
}
