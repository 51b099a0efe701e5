#![forbid(unsafe_code)]

//! Wire format of the cross-context message channel.
//!
//! Every post is a flat object `{type, source, language?, timestamp}`. The
//! language travels as a raw string: an unsupported code is a protocol-level
//! no-op decided by the receiver, not a decode failure.
//!
//! Pages built before the current names post `LANGUAGE_*` types. Those decode
//! to their own kinds so a request can be answered in the naming the
//! requester listens for.

use serde::{Deserialize, Serialize};

use crate::error::MessageError;
use crate::language::LanguageCode;

/// Message discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    /// Ask the receiver for its current language.
    Handshake,
    /// Reply to [`Handshake`](Self::Handshake).
    HandshakeAck,
    /// The sender's language changed.
    Change,
    /// Reconnect-timer variant of [`Handshake`](Self::Handshake).
    SyncRequest,
    /// Reply to [`SyncRequest`](Self::SyncRequest).
    SyncResponse,
    #[serde(rename = "LANGUAGE_HANDSHAKE_REQUEST")]
    LegacyHandshake,
    #[serde(rename = "LANGUAGE_HANDSHAKE_RESPONSE")]
    LegacyHandshakeAck,
    #[serde(rename = "LANGUAGE_CHANGE")]
    LegacyChange,
    /// Anything else posted on the same channel (other scripts, extensions).
    #[serde(other)]
    Unknown,
}

impl MessageKind {
    /// The reply a request kind expects, if any.
    #[must_use]
    pub const fn reply_kind(self) -> Option<Self> {
        match self {
            Self::Handshake => Some(Self::HandshakeAck),
            Self::SyncRequest => Some(Self::SyncResponse),
            Self::LegacyHandshake => Some(Self::LegacyHandshakeAck),
            _ => None,
        }
    }

    /// Answers to a request; receiving one means a peer is listening.
    #[must_use]
    pub const fn is_response(self) -> bool {
        matches!(
            self,
            Self::HandshakeAck | Self::SyncResponse | Self::LegacyHandshakeAck
        )
    }

    #[must_use]
    pub const fn is_change(self) -> bool {
        matches!(self, Self::Change | Self::LegacyChange)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Free-form sender identifier (host name of the posting page).
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Milliseconds since the Unix epoch on the sender's clock.
    #[serde(default)]
    pub timestamp: u64,
}

impl SyncMessage {
    #[must_use]
    pub fn new(
        kind: MessageKind,
        source: impl Into<String>,
        language: Option<LanguageCode>,
        timestamp: u64,
    ) -> Self {
        Self {
            kind,
            source: source.into(),
            language: language.map(|code| code.as_str().to_string()),
            timestamp,
        }
    }

    #[must_use]
    pub fn change(source: impl Into<String>, language: LanguageCode, timestamp: u64) -> Self {
        Self::new(MessageKind::Change, source, Some(language), timestamp)
    }

    /// Decode a JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::Json`] when the payload is not an object with a
    /// string `type` field of the expected shape.
    pub fn from_json(json: &str) -> Result<Self, MessageError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Encode as the JSON object posted to other contexts.
    #[must_use]
    pub fn to_json(&self) -> String {
        // A struct of strings and integers always serializes.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// The carried language, parsed without checking the supported set.
    #[must_use]
    pub fn language_code(&self) -> Option<LanguageCode> {
        self.language.as_deref().and_then(LanguageCode::parse)
    }
}

/// A message as delivered, with the transport-level facts the receiver needs.
#[derive(Debug, Clone)]
pub struct Inbound<W> {
    /// Origin the transport reports for the sender (`MessageEvent.origin`).
    pub origin: String,
    /// Handle to post replies to (`MessageEvent.source`), when available.
    pub reply_to: Option<W>,
    pub message: SyncMessage,
}

impl<W> Inbound<W> {
    pub fn new(origin: impl Into<String>, reply_to: Option<W>, message: SyncMessage) -> Self {
        Self {
            origin: origin.into(),
            reply_to,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn encodes_flat_object_with_type_tag() {
        let msg = SyncMessage::change("www.example.com", LanguageCode::Jp, 1_700_000_000_000);
        assert_eq!(
            msg.to_json(),
            r#"{"type":"CHANGE","source":"www.example.com","language":"jp","timestamp":1700000000000}"#
        );
        let request = SyncMessage::new(MessageKind::SyncRequest, "a", None, 5);
        assert_eq!(
            request.to_json(),
            r#"{"type":"SYNC_REQUEST","source":"a","timestamp":5}"#
        );
    }

    #[test]
    fn decodes_all_kinds() {
        for (wire, kind) in [
            ("HANDSHAKE", MessageKind::Handshake),
            ("HANDSHAKE_ACK", MessageKind::HandshakeAck),
            ("CHANGE", MessageKind::Change),
            ("SYNC_REQUEST", MessageKind::SyncRequest),
            ("SYNC_RESPONSE", MessageKind::SyncResponse),
        ] {
            let msg = SyncMessage::from_json(&format!(r#"{{"type":"{wire}"}}"#)).unwrap();
            assert_eq!(msg.kind, kind);
            assert_eq!(msg.timestamp, 0);
        }
    }

    #[test]
    fn legacy_names_keep_their_own_kinds() {
        let change =
            SyncMessage::from_json(r#"{"type":"LANGUAGE_CHANGE","language":"cn","source":"a"}"#)
                .unwrap();
        assert_eq!(change.kind, MessageKind::LegacyChange);
        assert!(change.kind.is_change());
        assert_eq!(change.language_code(), Some(LanguageCode::Cn));

        let request = SyncMessage::from_json(r#"{"type":"LANGUAGE_HANDSHAKE_REQUEST"}"#).unwrap();
        assert_eq!(request.kind, MessageKind::LegacyHandshake);
        let response =
            SyncMessage::from_json(r#"{"type":"LANGUAGE_HANDSHAKE_RESPONSE","language":"en"}"#)
                .unwrap();
        assert_eq!(response.kind, MessageKind::LegacyHandshakeAck);
        assert!(response.kind.is_response());
    }

    #[test]
    fn legacy_reply_encodes_with_legacy_name() {
        let reply = SyncMessage::new(
            MessageKind::LegacyHandshakeAck,
            "a",
            Some(LanguageCode::Jp),
            5,
        );
        assert_eq!(
            reply.to_json(),
            r#"{"type":"LANGUAGE_HANDSHAKE_RESPONSE","source":"a","language":"jp","timestamp":5}"#
        );
    }

    #[test]
    fn unknown_types_decode_as_unknown() {
        let stray = SyncMessage::from_json(
            r#"{"type":"LANGUAGE_TEST","message":"Testing connection","timestamp":1}"#,
        )
        .unwrap();
        assert_eq!(stray.kind, MessageKind::Unknown);
    }

    #[test]
    fn non_objects_and_missing_type_are_errors() {
        assert!(SyncMessage::from_json("\"hello\"").is_err());
        assert!(SyncMessage::from_json("{}").is_err());
        assert!(SyncMessage::from_json(r#"{"type":7}"#).is_err());
        assert!(SyncMessage::from_json("not json").is_err());
    }

    #[test]
    fn unsupported_language_is_not_a_decode_error() {
        let msg = SyncMessage::from_json(r#"{"type":"CHANGE","language":"de"}"#).unwrap();
        assert_eq!(msg.language.as_deref(), Some("de"));
        assert_eq!(msg.language_code(), None);
    }

    #[test]
    fn request_kinds_name_their_reply() {
        assert_eq!(
            MessageKind::Handshake.reply_kind(),
            Some(MessageKind::HandshakeAck)
        );
        assert_eq!(
            MessageKind::SyncRequest.reply_kind(),
            Some(MessageKind::SyncResponse)
        );
        assert_eq!(
            MessageKind::LegacyHandshake.reply_kind(),
            Some(MessageKind::LegacyHandshakeAck)
        );
        assert_eq!(MessageKind::Change.reply_kind(), None);
        assert!(MessageKind::SyncResponse.is_response());
        assert!(!MessageKind::Change.is_response());
    }
}
