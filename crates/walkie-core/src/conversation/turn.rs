//! Conversation turn types.
//!
//! A turn is one message of a transcript. The wire format uses `file`
//! (sometimes `image`) and `fileName` for attachments and a numeric timestamp
//! that may be an integer or a float; [`Turn`] hides that behind a typed
//! attachment reference and a millisecond `i64`.

use serde::{Deserialize, Serialize};

use super::timestamp::{normalize_timestamp, now_millis};

/// Represents the author of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// Sent by the local user.
    User,
    /// Streamed by the backend.
    Assistant,
    /// Produced locally on transport failure or abort; never sent.
    Error,
}

/// Reference to a remote file attached to a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    /// Remote URL or identifier.
    pub url: String,
    /// Declared file name, if known.
    pub file_name: Option<String>,
}

/// A single message in a conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TurnWire", into = "TurnWire")]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    /// Creation time in milliseconds. Zero means "unknown" until normalized.
    pub timestamp: i64,
    pub attachment: Option<AttachmentRef>,
}

impl Turn {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: now_millis(),
            attachment: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(TurnRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(TurnRole::Assistant, content)
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::new(TurnRole::Error, content)
    }

    pub fn with_attachment(mut self, attachment: Option<AttachmentRef>) -> Self {
        self.attachment = attachment;
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Returns a copy with the timestamp normalized to milliseconds.
    pub fn normalized(mut self, now: i64) -> Self {
        self.timestamp = normalize_timestamp(self.timestamp, now);
        self
    }

    pub fn is_assistant(&self) -> bool {
        self.role == TurnRole::Assistant
    }
}

/// Numeric timestamp as it appears on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Int(i64),
    Float(f64),
}

impl RawTimestamp {
    fn as_i64(self) -> i64 {
        match self {
            RawTimestamp::Int(value) => value,
            RawTimestamp::Float(value) => value.round() as i64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TurnWire {
    role: TurnRole,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<RawTimestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file: Option<String>,
    /// Legacy duplicate of `file`.
    #[serde(default, skip_serializing)]
    image: Option<String>,
    #[serde(default, rename = "fileName", skip_serializing_if = "Option::is_none")]
    file_name: Option<String>,
}

impl From<TurnWire> for Turn {
    fn from(wire: TurnWire) -> Self {
        Self {
            role: wire.role,
            content: wire.content,
            timestamp: wire.timestamp.map(RawTimestamp::as_i64).unwrap_or(0),
            attachment: wire.file.or(wire.image).map(|url| AttachmentRef {
                url,
                file_name: wire.file_name,
            }),
        }
    }
}

impl From<Turn> for TurnWire {
    fn from(turn: Turn) -> Self {
        let (file, file_name) = match turn.attachment {
            Some(AttachmentRef { url, file_name }) => (Some(url), file_name),
            None => (None, None),
        };
        Self {
            role: turn.role,
            content: turn.content,
            timestamp: Some(RawTimestamp::Int(turn.timestamp)),
            file,
            image: None,
            file_name,
        }
    }
}
