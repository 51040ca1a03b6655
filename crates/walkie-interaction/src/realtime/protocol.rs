//! Realtime wire protocol.
//!
//! Inbound frames are either bare literals (`connected`, `true`, `false`) or
//! JSON objects. Classification happens in two stages: literals first, then
//! the JSON payload by field precedence (`success:false`, then `content`,
//! then `type:"error"`).

use serde::Serialize;
use serde_json::{Map, Value};
use walkie_core::attachment::PendingAttachment;
use walkie_core::model_selection::Provider;

pub const KEEPALIVE: &str = "connected";
pub const AUTH_ACCEPTED: &str = "true";
pub const AUTH_REJECTED: &str = "false";
pub const DONE_MARKER: &str = "[DONE]";
pub const DEFAULT_FAILURE_MESSAGE: &str = "An error occurred";

/// Incremental assistant output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamChunk {
    pub content: String,
    pub timestamp: Option<i64>,
    pub file: Option<String>,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Keepalive,
    AuthAccepted,
    AuthRejected,
    Chunk(StreamChunk),
    /// `content: "[DONE]"`.
    Done,
    /// `success: false`.
    Rejected { message: String },
    /// `type: "error"`.
    ServerError { message: String },
    /// Valid JSON that carries nothing actionable.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(String),
}

/// Classifies one inbound text frame.
pub fn classify(raw: &str) -> Result<InboundFrame, ProtocolError> {
    match raw {
        KEEPALIVE => return Ok(InboundFrame::Keepalive),
        AUTH_ACCEPTED => return Ok(InboundFrame::AuthAccepted),
        AUTH_REJECTED => return Ok(InboundFrame::AuthRejected),
        _ => {}
    }

    let value: Value =
        serde_json::from_str(raw).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    Ok(match value {
        Value::Object(object) => classify_object(&object),
        _ => InboundFrame::Ignored,
    })
}

fn classify_object(object: &Map<String, Value>) -> InboundFrame {
    let text = |key: &str| object.get(key).and_then(Value::as_str);

    if object.get("success").and_then(Value::as_bool) == Some(false) {
        return InboundFrame::Rejected {
            message: non_empty(text("message")).unwrap_or(DEFAULT_FAILURE_MESSAGE).to_string(),
        };
    }

    if let Some(content) = non_empty(text("content")) {
        if content == DONE_MARKER {
            return InboundFrame::Done;
        }
        return InboundFrame::Chunk(StreamChunk {
            content: content.to_string(),
            timestamp: object.get("timestamp").and_then(timestamp_value),
            file: non_empty(text("file")).map(str::to_string),
            file_name: non_empty(text("fileName")).map(str::to_string),
        });
    }

    if text("type") == Some("error") {
        return InboundFrame::ServerError {
            message: non_empty(text("error")).unwrap_or(DEFAULT_FAILURE_MESSAGE).to_string(),
        };
    }

    InboundFrame::Ignored
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

fn timestamp_value(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f.round() as i64))
        .filter(|ts| *ts > 0)
}

/// Outbound user turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundTurn {
    pub chatid: String,
    pub content: String,
    pub provider: Provider,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
}

impl OutboundTurn {
    pub fn new(
        chat_id: &str,
        content: &str,
        provider: Provider,
        model: &str,
        attachment: Option<&PendingAttachment>,
    ) -> Self {
        Self {
            chatid: chat_id.to_string(),
            content: content.to_string(),
            provider,
            model: model.to_string(),
            file: attachment.map(|a| a.url.clone()),
            file_type: attachment.map(|a| a.mime_type.clone()),
        }
    }

    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
