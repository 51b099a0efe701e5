#![forbid(unsafe_code)]

//! Delivery of messages to related browsing contexts.
//!
//! Targets are the parent (when framed), the opener, windows this page opened
//! and same-page iframes. Every one of them can disappear at any moment, so a
//! broadcast treats each post independently: a failure is recorded and the
//! loop moves on.

use tracing::{debug, trace, warn};

use crate::error::DeliveryError;
use crate::message::SyncMessage;

/// Non-owned handle to another browsing context.
pub trait WindowHandle {
    fn is_closed(&self) -> bool;

    /// Post `message` restricted to `target_origin`.
    fn post(&self, message: &SyncMessage, target_origin: &str) -> Result<(), DeliveryError>;
}

/// How a target is related to this page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetRole {
    Parent,
    Opener,
    Child,
    Frame,
}

impl TargetRole {
    /// Parent and opener are "upstream": the contexts a page asks for state.
    #[must_use]
    pub const fn is_upstream(self) -> bool {
        matches!(self, Self::Parent | Self::Opener)
    }
}

/// Related contexts known to this page.
#[derive(Debug, Clone)]
pub struct TargetRegistry<W> {
    parent: Option<W>,
    opener: Option<W>,
    children: Vec<W>,
    frames: Vec<W>,
}

impl<W> Default for TargetRegistry<W> {
    fn default() -> Self {
        Self {
            parent: None,
            opener: None,
            children: Vec::new(),
            frames: Vec::new(),
        }
    }
}

impl<W: WindowHandle> TargetRegistry<W> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the embedding window. Hosts pass this only when the page is framed.
    #[must_use]
    pub fn with_parent(mut self, parent: W) -> Self {
        self.parent = Some(parent);
        self
    }

    #[must_use]
    pub fn with_opener(mut self, opener: W) -> Self {
        self.opener = Some(opener);
        self
    }

    /// Track a window this page opened.
    pub fn register_window(&mut self, window: W) {
        self.children.push(window);
    }

    /// Track a same-page iframe.
    pub fn register_frame(&mut self, frame: W) {
        self.frames.push(frame);
    }

    /// Whether a parent or a still-open opener exists.
    #[must_use]
    pub fn has_upstream(&self) -> bool {
        self.parent.is_some() || self.opener.as_ref().is_some_and(|w| !w.is_closed())
    }

    /// Number of tracked children and frames.
    #[must_use]
    pub fn downstream_len(&self) -> usize {
        self.children.len() + self.frames.len()
    }

    /// Every target in delivery order: parent, opener, children, frames.
    pub fn iter(&self) -> impl Iterator<Item = (TargetRole, &W)> {
        self.parent
            .iter()
            .map(|w| (TargetRole::Parent, w))
            .chain(self.opener.iter().map(|w| (TargetRole::Opener, w)))
            .chain(self.children.iter().map(|w| (TargetRole::Child, w)))
            .chain(self.frames.iter().map(|w| (TargetRole::Frame, w)))
    }

    /// Drop children and frames that have closed. Parent and opener are
    /// owned by the browser and never pruned.
    pub fn prune_closed(&mut self) -> usize {
        let before = self.downstream_len();
        self.children.retain(|w| !w.is_closed());
        self.frames.retain(|w| !w.is_closed());
        before - self.downstream_len()
    }
}

/// Per-target outcome of a broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: Vec<TargetRole>,
    pub skipped_closed: usize,
    pub failures: Vec<(TargetRole, DeliveryError)>,
}

impl BroadcastReport {
    #[must_use]
    pub fn delivered_count(&self) -> usize {
        self.delivered.len()
    }
}

/// Posts messages to related contexts under the trusted origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broadcaster {
    trusted_origin: String,
}

impl Broadcaster {
    #[must_use]
    pub fn new(trusted_origin: impl Into<String>) -> Self {
        Self {
            trusted_origin: trusted_origin.into(),
        }
    }

    /// Post to every reachable target, then prune closed children and frames.
    pub fn broadcast<W: WindowHandle>(
        &self,
        targets: &mut TargetRegistry<W>,
        message: &SyncMessage,
    ) -> BroadcastReport {
        let report = self.deliver(targets.iter(), message);
        let pruned = targets.prune_closed();
        if pruned > 0 {
            trace!(pruned, "forgot closed windows");
        }
        debug!(
            kind = ?message.kind,
            delivered = report.delivered.len(),
            failed = report.failures.len(),
            "broadcast"
        );
        report
    }

    /// Post only to the parent and opener.
    pub fn send_upstream<W: WindowHandle>(
        &self,
        targets: &TargetRegistry<W>,
        message: &SyncMessage,
    ) -> BroadcastReport {
        self.deliver(
            targets.iter().filter(|(role, _)| role.is_upstream()),
            message,
        )
    }

    /// Post to a single window, typically the sender of a request.
    ///
    /// # Errors
    ///
    /// Returns the [`DeliveryError`] from the window, or
    /// [`DeliveryError::Closed`] if it was already closed.
    pub fn send_to<W: WindowHandle>(
        &self,
        target: &W,
        message: &SyncMessage,
    ) -> Result<(), DeliveryError> {
        if target.is_closed() {
            return Err(DeliveryError::Closed);
        }
        target.post(message, &self.trusted_origin)
    }

    fn deliver<'a, W: WindowHandle + 'a>(
        &self,
        targets: impl Iterator<Item = (TargetRole, &'a W)>,
        message: &SyncMessage,
    ) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        for (role, window) in targets {
            if window.is_closed() {
                report.skipped_closed += 1;
                continue;
            }
            match window.post(message, &self.trusted_origin) {
                Ok(()) => report.delivered.push(role),
                Err(err) => {
                    warn!(?role, error = %err, "failed to post to related window");
                    report.failures.push((role, err));
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::LanguageCode;
    use crate::memory::MemoryWindow;
    use pretty_assertions::assert_eq;

    const ORIGIN: &str = "https://example.com";

    fn change() -> SyncMessage {
        SyncMessage::change("test", LanguageCode::Jp, 1)
    }

    #[test]
    fn closed_second_target_does_not_block_first_and_third() {
        let (first, second, third) = (MemoryWindow::new(), MemoryWindow::new(), MemoryWindow::new());
        second.close();
        let mut targets = TargetRegistry::new();
        targets.register_window(first.clone());
        targets.register_window(second.clone());
        targets.register_window(third.clone());

        let report = Broadcaster::new(ORIGIN).broadcast(&mut targets, &change());
        assert_eq!(report.delivered, vec![TargetRole::Child, TargetRole::Child]);
        assert_eq!(report.skipped_closed, 1);
        assert_eq!(first.received(), 1);
        assert_eq!(second.received(), 0);
        assert_eq!(third.received(), 1);
        assert_eq!(targets.downstream_len(), 2);
    }

    #[test]
    fn rejecting_target_is_reported_and_others_still_receive() {
        let (first, second, third) = (MemoryWindow::new(), MemoryWindow::new(), MemoryWindow::new());
        second.reject_posts(true);
        let mut targets = TargetRegistry::new()
            .with_parent(first.clone())
            .with_opener(second.clone());
        targets.register_frame(third.clone());

        let report = Broadcaster::new(ORIGIN).broadcast(&mut targets, &change());
        assert_eq!(report.delivered, vec![TargetRole::Parent, TargetRole::Frame]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, TargetRole::Opener);
        assert_eq!(first.received(), 1);
        assert_eq!(third.received(), 1);
    }

    #[test]
    fn posts_carry_the_trusted_origin() {
        let child = MemoryWindow::new();
        let mut targets = TargetRegistry::new();
        targets.register_window(child.clone());
        Broadcaster::new(ORIGIN).broadcast(&mut targets, &change());
        let posted = child.drain();
        assert_eq!(posted[0].target_origin, ORIGIN);
        assert_eq!(posted[0].message, change());
    }

    #[test]
    fn upstream_excludes_children_and_frames() {
        let (parent, opener, child) = (MemoryWindow::new(), MemoryWindow::new(), MemoryWindow::new());
        let mut targets = TargetRegistry::new()
            .with_parent(parent.clone())
            .with_opener(opener.clone());
        targets.register_window(child.clone());
        let report = Broadcaster::new(ORIGIN).send_upstream(&targets, &change());
        assert_eq!(report.delivered, vec![TargetRole::Parent, TargetRole::Opener]);
        assert_eq!(child.received(), 0);
    }

    #[test]
    fn has_upstream_ignores_closed_opener() {
        let opener = MemoryWindow::new();
        let targets = TargetRegistry::new().with_opener(opener.clone());
        assert!(targets.has_upstream());
        opener.close();
        assert!(!targets.has_upstream());
        assert!(!TargetRegistry::<MemoryWindow>::new().has_upstream());
    }

    #[test]
    fn send_to_closed_window_fails() {
        let window = MemoryWindow::new();
        window.close();
        assert_eq!(
            Broadcaster::new(ORIGIN).send_to(&window, &change()),
            Err(DeliveryError::Closed)
        );
    }
}
