//! Configuration service.
//!
//! Loads [`ClientConfig`] from `~/.config/walkie/config.toml` and applies
//! environment overrides on top.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use walkie_core::config::ClientConfig;

use crate::paths::WalkiePaths;
use crate::storage::{AtomicTomlFile, StorageError};

pub const API_URL_ENV: &str = "WALKIE_API_URL";
pub const REALTIME_URL_ENV: &str = "WALKIE_REALTIME_URL";
pub const HCAPTCHA_SITE_KEY_ENV: &str = "WALKIE_HCAPTCHA_SITE_KEY";

/// Loads and caches the client configuration.
#[derive(Debug, Clone)]
pub struct ConfigService {
    path: Option<PathBuf>,
    config: Arc<RwLock<Option<ClientConfig>>>,
}

impl ConfigService {
    /// Service reading the default config file.
    pub fn new() -> Self {
        Self {
            path: WalkiePaths::config_file().ok(),
            config: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path: Some(path),
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Returns the configuration, loading it on first access.
    ///
    /// A missing or unreadable file falls back to defaults (logged), so the
    /// client always starts.
    pub fn get_config(&self) -> ClientConfig {
        if let Some(cached) = self.read_cache() {
            return cached;
        }

        let mut loaded = match self.load_file() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("[ConfigService] Falling back to defaults: {}", e);
                ClientConfig::default()
            }
        };
        apply_env_overrides(&mut loaded, |key| std::env::var(key).ok());

        let mut guard = self.config.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(loaded.clone());
        loaded
    }

    pub fn invalidate_cache(&self) {
        let mut guard = self.config.write().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }

    fn read_cache(&self) -> Option<ClientConfig> {
        self.config
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn load_file(&self) -> Result<ClientConfig, StorageError> {
        let Some(path) = self.path.clone() else {
            return Ok(ClientConfig::default());
        };
        tracing::debug!("[ConfigService] Loading {}", path.display());
        Ok(AtomicTomlFile::<ClientConfig>::new(path)
            .load()?
            .unwrap_or_default())
    }
}

impl Default for ConfigService {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies `WALKIE_*` overrides. Empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut ClientConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(url) = non_empty(API_URL_ENV) {
        config.api_url = url;
    }
    if let Some(url) = non_empty(REALTIME_URL_ENV) {
        config.realtime_url = url;
    }
    if let Some(key) = non_empty(HCAPTCHA_SITE_KEY_ENV) {
        config.hcaptcha_site_key = Some(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_env_overrides_win_over_file() {
        let mut config = ClientConfig {
            api_url: "http://from-file".to_string(),
            ..ClientConfig::default()
        };
        let env: HashMap<&str, &str> = [
            (API_URL_ENV, "http://from-env"),
            (REALTIME_URL_ENV, ""),
            (HCAPTCHA_SITE_KEY_ENV, "site-key"),
        ]
        .into_iter()
        .collect();

        apply_env_overrides(&mut config, |key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.api_url, "http://from-env");
        assert_eq!(config.realtime_url, ClientConfig::default().realtime_url);
        assert_eq!(config.hcaptcha_site_key.as_deref(), Some("site-key"));
    }

    #[test]
    fn test_file_values_are_loaded_and_cached() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "liveness_window_ms = 9000\n").unwrap();

        let service = ConfigService::with_path(path.clone());
        assert_eq!(service.get_config().liveness_window_ms, 9000);

        std::fs::write(&path, "liveness_window_ms = 1\n").unwrap();
        assert_eq!(service.get_config().liveness_window_ms, 9000);

        service.invalidate_cache();
        assert_eq!(service.get_config().liveness_window_ms, 1);
    }

    #[test]
    fn test_broken_file_falls_back_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "this is = = not toml").unwrap();

        let config = ConfigService::with_path(path).get_config();
        assert_eq!(config.reconnect_delay_ms, 1_000);
    }
}
