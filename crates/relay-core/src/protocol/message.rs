//! The JSON message envelope.
//!
//! ```json
//! {"type": 1, "sender": "alice", "content": "hi", "target": null, "timestamp": "2024-05-01T12:00:00Z"}
//! ```
//!
//! Type codes: `1` TEXT, `2` JOIN, `3` LEAVE, `4` COMMAND_RESULT, `5` SYSTEM,
//! `7` HEARTBEAT. Code `6` is reserved for encrypted payloads and rejected.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::types::UserId;

/// Sender name used for server-originated messages.
pub const SYSTEM_SENDER: &str = "SERVER";

/// Message kind, serialized as its numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum MessageType {
    /// Chat text, broadcast or directed.
    Text,
    /// A user's session was created.
    Join,
    /// A user's session was destroyed.
    Leave,
    /// Reply to a command, delivered only to the issuer.
    CommandResult,
    /// Server notice (errors, routing failures, shutdown).
    System,
    /// Liveness ping from a client, or the server's pong.
    Heartbeat,
}

impl MessageType {
    /// Numeric wire code.
    pub fn code(&self) -> u8 {
        match self {
            Self::Text => 1,
            Self::Join => 2,
            Self::Leave => 3,
            Self::CommandResult => 4,
            Self::System => 5,
            Self::Heartbeat => 7,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Join => "JOIN",
            Self::Leave => "LEAVE",
            Self::CommandResult => "COMMAND_RESULT",
            Self::System => "SYSTEM",
            Self::Heartbeat => "HEARTBEAT",
        }
    }
}

impl TryFrom<u8> for MessageType {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Text),
            2 => Ok(Self::Join),
            3 => Ok(Self::Leave),
            4 => Ok(Self::CommandResult),
            5 => Ok(Self::System),
            7 => Ok(Self::Heartbeat),
            other => Err(format!("unsupported message type code {other}")),
        }
    }
}

impl From<MessageType> for u8 {
    fn from(kind: MessageType) -> u8 {
        kind.code()
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable message envelope.
///
/// Fields are private; the `with_*` methods return a new message so that
/// substitutions by hooks or the router never alter a value already seen
/// by someone else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    kind: MessageType,
    #[serde(default)]
    sender: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    target: Option<UserId>,
    #[serde(default = "Utc::now")]
    timestamp: DateTime<Utc>,
}

impl Message {
    /// Build a message stamped with the current time.
    pub fn new(
        kind: MessageType,
        sender: impl Into<String>,
        content: impl Into<String>,
        target: Option<UserId>,
    ) -> Self {
        Self {
            kind,
            sender: sender.into(),
            content: content.into(),
            target,
            timestamp: Utc::now(),
        }
    }

    /// Chat text from `sender`.
    pub fn text(sender: &UserId, content: impl Into<String>, target: Option<UserId>) -> Self {
        Self::new(MessageType::Text, sender.as_str(), content, target)
    }

    /// Presence announcement for a newly created session.
    pub fn join(user: &UserId) -> Self {
        Self::new(MessageType::Join, user.as_str(), format!("{user} joined the chat"), None)
    }

    /// Presence announcement for a destroyed session.
    pub fn leave(user: &UserId) -> Self {
        Self::new(MessageType::Leave, user.as_str(), format!("{user} left the chat"), None)
    }

    /// Server notice, optionally addressed to one user.
    pub fn system(content: impl Into<String>, target: Option<UserId>) -> Self {
        Self::new(MessageType::System, SYSTEM_SENDER, content, target)
    }

    /// Command reply addressed to the issuer.
    pub fn command_result(content: impl Into<String>, target: &UserId) -> Self {
        Self::new(
            MessageType::CommandResult,
            SYSTEM_SENDER,
            content,
            Some(target.clone()),
        )
    }

    /// Heartbeat reply.
    pub fn pong(target: &UserId) -> Self {
        Self::new(MessageType::Heartbeat, SYSTEM_SENDER, "pong", Some(target.clone()))
    }

    /// Message kind.
    pub fn kind(&self) -> MessageType {
        self.kind
    }

    /// Sender reference: a user id or [`SYSTEM_SENDER`].
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Text payload.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Recipient for directed delivery; `None` means broadcast.
    pub fn target(&self) -> Option<&UserId> {
        self.target.as_ref()
    }

    /// Creation time.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// `true` if the message is addressed to a single user.
    pub fn is_directed(&self) -> bool {
        self.target.is_some()
    }

    /// A copy of this message attributed to `sender`.
    pub fn with_sender(&self, sender: &UserId) -> Self {
        Self {
            sender: sender.as_str().to_string(),
            ..self.clone()
        }
    }

    /// A copy attributed to `sender` and timestamped now. Applied to every
    /// client message before it is routed.
    pub fn stamped(&self, sender: &UserId) -> Self {
        Self {
            sender: sender.as_str().to_string(),
            timestamp: Utc::now(),
            ..self.clone()
        }
    }

    /// A copy of this message with different content.
    pub fn with_content(&self, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..self.clone()
        }
    }

    /// Decode a message from its JSON wire form.
    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        serde_json::from_str(raw)
            .map_err(|e| AppError::validation(format!("Invalid message: {e}")))
    }

    /// Encode the message to its JSON wire form.
    pub fn to_json(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_codes_on_the_wire() {
        let msg = Message::join(&UserId::from("alice"));
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], 2);
        assert_eq!(value["sender"], "alice");
        assert_eq!(value["content"], "alice joined the chat");
        assert!(value["target"].is_null());
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_inbound_defaults() {
        let msg = Message::from_json(r#"{"type": 1, "content": "hi"}"#).unwrap();
        assert_eq!(msg.kind(), MessageType::Text);
        assert_eq!(msg.sender(), "");
        assert!(msg.target().is_none());
    }

    #[test]
    fn test_reserved_code_rejected() {
        assert!(Message::from_json(r#"{"type": 6, "content": "x"}"#).is_err());
        assert!(Message::from_json(r#"{"type": 42}"#).is_err());
        assert!(Message::from_json("not json").is_err());
    }

    #[test]
    fn test_with_sender_leaves_original_untouched() {
        let original = Message::from_json(r#"{"type": 1, "sender": "mallory", "content": "hi"}"#)
            .unwrap();
        let stamped = original.with_sender(&UserId::from("bob"));
        assert_eq!(original.sender(), "mallory");
        assert_eq!(stamped.sender(), "bob");
        assert_eq!(stamped.content(), "hi");
        assert_eq!(stamped.timestamp(), original.timestamp());
    }

    #[test]
    fn test_stamped_replaces_client_timestamp() {
        let raw = r#"{"type": 1, "sender": "mallory", "content": "hi", "timestamp": "2001-01-01T00:00:00Z"}"#;
        let original = Message::from_json(raw).unwrap();
        let before = Utc::now();
        let stamped = original.stamped(&UserId::from("bob"));

        assert_eq!(stamped.sender(), "bob");
        assert_eq!(stamped.content(), "hi");
        assert!(stamped.timestamp() >= before);
        assert_eq!(original.timestamp().to_rfc3339(), "2001-01-01T00:00:00+00:00");
    }
}
