use thiserror::Error;

use crate::language::LanguageCode;

/// Invalid language input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LanguageError {
    #[error("unknown language code: {0}")]
    Unknown(String),

    #[error("supported language set is empty")]
    EmptySet,

    #[error("language listed twice: {0}")]
    Duplicate(LanguageCode),
}

/// Which durable channel an operation touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Storage,
    Cookie,
    Url,
}

impl core::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Storage => "storage",
            Self::Cookie => "cookie",
            Self::Url => "url",
        })
    }
}

/// Failure reading or writing a durable channel.
///
/// Never escapes the preference store; it is logged and reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// Channel is missing entirely (private browsing, sandboxed frame, disabled).
    #[error("{channel} unavailable: {reason}")]
    Unavailable { channel: ChannelKind, reason: String },

    /// Channel exists but refused the operation (quota, security error).
    #[error("{channel} rejected {op}: {reason}")]
    Rejected {
        channel: ChannelKind,
        op: &'static str,
        reason: String,
    },
}

impl ChannelError {
    #[must_use]
    pub fn unavailable(channel: ChannelKind, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            channel,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn rejected(channel: ChannelKind, op: &'static str, reason: impl Into<String>) -> Self {
        Self::Rejected {
            channel,
            op,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn channel(&self) -> ChannelKind {
        match self {
            Self::Unavailable { channel, .. } | Self::Rejected { channel, .. } => *channel,
        }
    }
}

/// Failure posting to another browsing context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("target window is closed")]
    Closed,

    #[error("post rejected: {0}")]
    Rejected(String),
}

/// Inbound payload that could not be decoded as a sync message.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("message JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Invalid [`SyncConfig`](crate::config::SyncConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("trusted origin must be a scheme://host[:port] origin, got {0:?}")]
    InvalidOrigin(String),

    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_error_reports_its_channel() {
        let err = ChannelError::rejected(ChannelKind::Storage, "set", "QuotaExceededError");
        assert_eq!(err.channel(), ChannelKind::Storage);
        assert_eq!(
            err.to_string(),
            "storage rejected set: QuotaExceededError"
        );
    }
}
