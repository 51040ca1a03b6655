//! Durable storage for the session credential.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use walkie_core::error::Result;

use super::atomic_toml::{AtomicTomlFile, StorageError};
use crate::paths::WalkiePaths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CredentialRecord {
    token: String,
}

/// Keeps the bearer credential across restarts.
pub struct CredentialStore {
    file: AtomicTomlFile<CredentialRecord>,
}

impl CredentialStore {
    /// Store at the default location (`~/.config/walkie/credential.toml`).
    pub fn new() -> Result<Self> {
        let path = WalkiePaths::credential_file().map_err(StorageError::from)?;
        Ok(Self::at(path))
    }

    pub fn at(path: PathBuf) -> Self {
        Self {
            file: AtomicTomlFile::new(path).private(),
        }
    }

    pub fn load(&self) -> Result<Option<String>> {
        Ok(self
            .file
            .load()?
            .map(|record| record.token)
            .filter(|token| !token.is_empty()))
    }

    pub fn save(&self, token: &str) -> Result<()> {
        Ok(self.file.save(&CredentialRecord {
            token: token.to_string(),
        })?)
    }

    pub fn clear(&self) -> Result<()> {
        Ok(self.file.remove()?)
    }
}
