//! User preferences (selected provider/model).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use walkie_core::error::Result;
use walkie_core::model_selection::ModelSelection;

use super::atomic_toml::{AtomicTomlFile, StorageError};
use crate::paths::WalkiePaths;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub model: ModelSelection,
}

pub struct PreferenceStore {
    file: AtomicTomlFile<Preferences>,
}

impl PreferenceStore {
    pub fn new() -> Result<Self> {
        let path = WalkiePaths::preferences_file().map_err(StorageError::from)?;
        Ok(Self::at(path))
    }

    pub fn at(path: PathBuf) -> Self {
        Self {
            file: AtomicTomlFile::new(path),
        }
    }

    /// Current preferences; defaults when nothing was saved yet.
    pub fn load(&self) -> Result<Preferences> {
        Ok(self.file.load()?.unwrap_or_default())
    }

    pub fn set_model(&self, selection: ModelSelection) -> Result<Preferences> {
        Ok(self
            .file
            .update(Preferences::default(), move |prefs| prefs.model = selection)?)
    }
}
