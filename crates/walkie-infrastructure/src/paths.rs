//! Unified path management for walkie configuration files.
//!
//! ```text
//! ~/.config/walkie/
//! ├── config.toml        # ClientConfig overrides
//! ├── credential.toml    # Session credential (file mode 600 on Unix)
//! └── preferences.toml   # Selected provider/model
//! ```

use std::path::PathBuf;

const APP_DIR: &str = "walkie";

/// Overrides the config directory; mostly useful for tests and sandboxes.
pub const CONFIG_DIR_ENV: &str = "WALKIE_CONFIG_DIR";

/// Errors that can occur during path resolution.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("Cannot find home directory")]
    HomeDirNotFound,
}

pub struct WalkiePaths;

impl WalkiePaths {
    /// Returns the walkie configuration directory (e.g. `~/.config/walkie/`).
    pub fn config_dir() -> Result<PathBuf, PathError> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::HomeDirNotFound)
    }

    pub fn config_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn credential_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("credential.toml"))
    }

    pub fn preferences_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("preferences.toml"))
    }
}
