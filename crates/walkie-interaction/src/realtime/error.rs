//! Send failures and the user-facing texts of the realtime session.

use walkie_core::WalkieError;

pub const NO_MODEL_MESSAGE: &str = "Please select a chat model first";
pub const NO_CHAT_MESSAGE: &str = "No chat selected";
pub const CAPTION_REQUIRED_MESSAGE: &str = "Please add a caption for the file";
pub const CONNECTION_LOST_MESSAGE: &str = "Connection lost";
pub const AUTH_FAILED_MESSAGE: &str = "Authentication failed";
pub const PARSE_FAILED_MESSAGE: &str = "Failed to process response";
pub const ABORTED_TURN_TEXT: &str = "User aborted request.";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// Rejected before any network activity; the message was notified.
    #[error("{0}")]
    Precondition(String),

    #[error("Connection lost")]
    ConnectionLost,

    #[error("Failed to encode turn: {0}")]
    Encode(String),

    #[error("Realtime session stopped")]
    Stopped,
}

impl From<SendError> for WalkieError {
    fn from(e: SendError) -> Self {
        match e {
            SendError::Precondition(message) => WalkieError::precondition(message),
            SendError::ConnectionLost => WalkieError::ConnectionLost,
            other => WalkieError::internal(other.to_string()),
        }
    }
}
