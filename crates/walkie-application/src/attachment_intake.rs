//! Validating and uploading a local file before it is sent with a turn.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tokio_util::sync::CancellationToken;
use walkie_core::attachment::PendingAttachment;
use walkie_core::notification::Notifier;
use walkie_infrastructure::api::{ApiError, UploadFile};

use crate::backend::ChatBackend;

pub const LOGIN_TO_UPLOAD_MESSAGE: &str = "Please log in to upload files";
pub const UNSUPPORTED_TYPE_MESSAGE: &str = "Please upload only images, documents, or text files";
pub const TOO_LARGE_MESSAGE: &str = "File size should be less than 10MB";
pub const UPLOAD_FAILED_MESSAGE: &str = "Failed to upload file";
pub const ATTACHED_MESSAGE: &str = "File attached";

const ACCEPTED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
];
const ACCEPTED_EXTENSIONS: &[&str] = &["txt"];
const FALLBACK_MIME_TYPE: &str = "text/plain";

/// Name and guessed MIME type of a file on disk. The type is empty when
/// the extension is unknown.
fn describe(path: &Path) -> (String, String) {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mime_type = mime_guess::from_path(path)
        .first_raw()
        .unwrap_or_default()
        .to_string();
    (file_name, mime_type)
}

/// A file read from disk, not yet uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl LocalFile {
    pub async fn read(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let (file_name, mime_type) = describe(path);
        Ok(Self {
            file_name,
            mime_type,
            bytes,
        })
    }
}

/// Why a file cannot be attached. The message is the user-facing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AttachmentRejection {
    #[error("{}", UNSUPPORTED_TYPE_MESSAGE)]
    UnsupportedType,
    #[error("{}", TOO_LARGE_MESSAGE)]
    TooLarge,
}

/// Type check first, then size.
pub fn check_attachment(
    file_name: &str,
    mime_type: &str,
    size: u64,
    max_bytes: u64,
) -> Result<(), AttachmentRejection> {
    let accepted_extension = Path::new(file_name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| ACCEPTED_EXTENSIONS.contains(&ext.as_str()));
    if !ACCEPTED_MIME_TYPES.contains(&mime_type) && !accepted_extension {
        return Err(AttachmentRejection::UnsupportedType);
    }
    if size > max_bytes {
        return Err(AttachmentRejection::TooLarge);
    }
    Ok(())
}

pub struct AttachmentIntake {
    backend: Arc<dyn ChatBackend>,
    notifier: Notifier,
    max_bytes: u64,
}

impl AttachmentIntake {
    pub fn new(backend: Arc<dyn ChatBackend>, notifier: Notifier, max_bytes: u64) -> Self {
        Self {
            backend,
            notifier,
            max_bytes,
        }
    }

    /// Checks the file at `path` against its metadata, then reads and
    /// uploads it. Rejected files are never loaded.
    pub async fn attach_path(
        &self,
        path: &Path,
        token: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> Result<PendingAttachment> {
        let token = self.require_token(token)?;
        let size = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata.len(),
            Err(e) => return Err(self.read_failed(path, e.into())),
        };
        let (file_name, mime_type) = describe(path);
        self.check(&file_name, &mime_type, size)?;

        let file = match LocalFile::read(path).await {
            Ok(file) => file,
            Err(e) => return Err(self.read_failed(path, e)),
        };
        self.upload(file, token, cancel).await
    }

    /// Uploads `file` and returns the attachment to send with the next turn.
    pub async fn attach(
        &self,
        file: LocalFile,
        token: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> Result<PendingAttachment> {
        let token = self.require_token(token)?;
        self.check(&file.file_name, &file.mime_type, file.bytes.len() as u64)?;
        self.upload(file, token, cancel).await
    }

    fn require_token<'a>(&self, token: Option<&'a str>) -> Result<&'a str> {
        match token {
            Some(token) => Ok(token),
            None => {
                self.notifier.error(LOGIN_TO_UPLOAD_MESSAGE);
                bail!(LOGIN_TO_UPLOAD_MESSAGE)
            }
        }
    }

    fn check(&self, file_name: &str, mime_type: &str, size: u64) -> Result<()> {
        if let Err(rejection) = check_attachment(file_name, mime_type, size, self.max_bytes) {
            tracing::debug!("[AttachmentIntake] Rejected {}: {}", file_name, rejection);
            self.notifier.error(rejection.to_string());
            return Err(rejection.into());
        }
        Ok(())
    }

    fn read_failed(&self, path: &Path, error: anyhow::Error) -> anyhow::Error {
        self.notifier.error(format!("Failed to read {}", path.display()));
        error.context(format!("Failed to read {}", path.display()))
    }

    async fn upload(
        &self,
        file: LocalFile,
        token: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<PendingAttachment> {
        let file_name = file.file_name.clone();
        let mime_type = if file.mime_type.is_empty() {
            FALLBACK_MIME_TYPE.to_string()
        } else {
            file.mime_type.clone()
        };
        let upload = UploadFile {
            file_name: file.file_name,
            mime_type: mime_type.clone(),
            bytes: file.bytes,
        };

        match self.backend.upload_file(upload, token, cancel).await {
            Ok(url) => {
                tracing::debug!("[AttachmentIntake] Uploaded {} to {}", file_name, url);
                self.notifier.success(ATTACHED_MESSAGE);
                Ok(PendingAttachment {
                    url,
                    file_name,
                    mime_type,
                })
            }
            Err(ApiError::Cancelled) => Err(ApiError::Cancelled.into()),
            Err(e) => {
                tracing::warn!("[AttachmentIntake] Upload of {} failed: {}", file_name, e);
                match &e {
                    ApiError::Rejected { message, .. } if !message.is_empty() => {
                        self.notifier.error(message.clone())
                    }
                    _ => self.notifier.error(UPLOAD_FAILED_MESSAGE),
                }
                Err(e.into())
            }
        }
    }
}
