//! Pending attachment held between an upload and the next sent turn.

use crate::conversation::AttachmentRef;

/// A file that has been uploaded but not yet sent with a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAttachment {
    /// Remote URL returned by the upload call.
    pub url: String,
    /// Name of the local file as declared by the user.
    pub file_name: String,
    /// Declared MIME type, sent as `file_type`.
    pub mime_type: String,
}

impl PendingAttachment {
    pub fn to_attachment_ref(&self) -> AttachmentRef {
        AttachmentRef {
            url: self.url.clone(),
            file_name: Some(self.file_name.clone()),
        }
    }

    /// Coarse category used for display ("image", "document", ...).
    pub fn category(&self) -> &str {
        self.mime_type.split('/').next().unwrap_or("application")
    }
}
