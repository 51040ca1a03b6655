//! Error types shared by the Walkie crates.

use thiserror::Error;

/// Failure kinds the layers above converge on.
///
/// `Precondition` and `ConnectionLost` come from the realtime session; their
/// display text is what the user sees, so they carry no prefix.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalkieError {
    #[error("Conversation '{0}' not found")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Could not process {format}: {message}")]
    Serialization { format: &'static str, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Precondition(String),

    #[error("Connection lost")]
    ConnectionLost,

    #[error("API error: {0}")]
    Api(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WalkieError {
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// True when nothing reached the backend because a check failed locally.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Precondition(_))
    }
}

impl From<std::io::Error> for WalkieError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(format!("{} ({:?})", err, err.kind()))
    }
}

impl From<toml::de::Error> for WalkieError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML",
            message: err.message().to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, WalkieError>;
