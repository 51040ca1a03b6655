use walkie_core::WalkieError;

/// Failure of a single backend call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The backend answered with `success: false` or a non-2xx status.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// The request never produced a response.
    #[error("{0}")]
    Transport(String),

    /// The response body did not have the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The request could not be built (bad MIME type, unreadable file, ...).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Cancelled by the caller. Never surfaced as a notification.
    #[error("Request cancelled")]
    Cancelled,
}

impl ApiError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<ApiError> for WalkieError {
    fn from(e: ApiError) -> Self {
        WalkieError::Api(e.to_string())
    }
}
