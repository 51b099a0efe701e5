#![forbid(unsafe_code)]

//! Decides what an inbound message or storage event should do.
//!
//! The receiver only classifies; [`LanguageSync`](crate::sync::LanguageSync)
//! carries out the resulting [`Action`]. Accepted changes are always applied
//! without re-broadcasting, which is what keeps two contexts that both
//! broadcast on change from bouncing the same value back and forth.

use tracing::trace;

use crate::error::DeliveryError;
use crate::language::{LanguageCode, SupportedLanguages};
use crate::message::{MessageKind, SyncMessage};

/// Why an input did not change anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Declared origin differs from the trusted origin.
    UntrustedOrigin,
    /// Payload is not a sync message.
    Malformed,
    UnknownKind,
    MissingLanguage,
    /// Language is not a member of the supported set.
    UnsupportedLanguage,
    SameLanguage,
    /// A request arrived without a handle to answer it on.
    NoReplyTarget,
    /// Storage event for another key.
    ForeignStorageKey,
    /// Storage event for a removed or cleared key.
    StorageCleared,
    /// The sync instance has not been started.
    NotStarted,
}

/// What the sync instance should do with an accepted input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Apply locally, never re-broadcast.
    Apply(LanguageCode),
    /// Answer the requester with the current language.
    Reply(MessageKind),
    Ignore(IgnoreReason),
}

/// Classification of one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub action: Action,
    /// The message was an answer from a related context, so the link is live.
    pub peer_answered: bool,
}

impl Decision {
    const fn ignore(reason: IgnoreReason) -> Self {
        Self {
            action: Action::Ignore(reason),
            peer_answered: false,
        }
    }
}

/// Final result of handing an input to the sync instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Applied(LanguageCode),
    Replied {
        kind: MessageKind,
        language: LanguageCode,
    },
    ReplyFailed(DeliveryError),
    Ignored(IgnoreReason),
}

impl Disposition {
    /// The language this input switched the page to, if it did.
    #[must_use]
    pub fn applied(&self) -> Option<LanguageCode> {
        match self {
            Self::Applied(language) => Some(*language),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Receiver {
    trusted_origin: String,
    storage_key: String,
    languages: SupportedLanguages,
}

impl Receiver {
    #[must_use]
    pub fn new(
        trusted_origin: impl Into<String>,
        storage_key: impl Into<String>,
        languages: SupportedLanguages,
    ) -> Self {
        Self {
            trusted_origin: trusted_origin.into(),
            storage_key: storage_key.into(),
            languages,
        }
    }

    /// Whether `origin` is allowed to talk to this page at all.
    #[must_use]
    pub fn is_trusted(&self, origin: &str) -> bool {
        origin == self.trusted_origin
    }

    /// Classify a message posted from `origin` while `current` is active.
    #[must_use]
    pub fn decide_message(
        &self,
        origin: &str,
        message: &SyncMessage,
        current: LanguageCode,
    ) -> Decision {
        if !self.is_trusted(origin) {
            trace!(origin, "dropping message from untrusted origin");
            return Decision::ignore(IgnoreReason::UntrustedOrigin);
        }
        let kind = message.kind;
        if kind.is_change() || kind.is_response() {
            return Decision {
                action: self.change_action(message.language.as_deref(), current),
                peer_answered: kind.is_response(),
            };
        }
        match kind.reply_kind() {
            Some(reply) => Decision {
                action: Action::Reply(reply),
                peer_answered: false,
            },
            None => {
                trace!(source = %message.source, ?kind, "ignoring unknown message type");
                Decision::ignore(IgnoreReason::UnknownKind)
            }
        }
    }

    /// Classify a storage change notification (`key`, `newValue`).
    ///
    /// Same-page writes never produce these events in a browser; the
    /// same-language check also filters echoes of this page's own value.
    #[must_use]
    pub fn decide_storage(
        &self,
        key: Option<&str>,
        new_value: Option<&str>,
        current: LanguageCode,
    ) -> Action {
        if key != Some(self.storage_key.as_str()) {
            return Action::Ignore(IgnoreReason::ForeignStorageKey);
        }
        match new_value {
            Some(value) if !value.is_empty() => self.change_action(Some(value), current),
            _ => Action::Ignore(IgnoreReason::StorageCleared),
        }
    }

    fn change_action(&self, raw: Option<&str>, current: LanguageCode) -> Action {
        let Some(raw) = raw else {
            return Action::Ignore(IgnoreReason::MissingLanguage);
        };
        match self.languages.accept(raw) {
            None => {
                trace!(language = raw, "ignoring unsupported language");
                Action::Ignore(IgnoreReason::UnsupportedLanguage)
            }
            Some(language) if language == current => Action::Ignore(IgnoreReason::SameLanguage),
            Some(language) => Action::Apply(language),
        }
    }
}
