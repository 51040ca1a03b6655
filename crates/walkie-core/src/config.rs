//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "https://api.walkie-ai.com";
pub const DEFAULT_REALTIME_URL: &str = "wss://chat.walkie-ai.com";
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Settings read from `config.toml`. Durations are in milliseconds.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    pub api_url: String,
    pub realtime_url: String,
    pub hcaptcha_site_key: Option<String>,
    pub reconnect_delay_ms: u64,
    pub abort_reconnect_delay_ms: u64,
    pub liveness_window_ms: u64,
    pub liveness_check_interval_ms: u64,
    /// Reconnect after the backend answers `false` to the credential frame.
    pub retry_on_auth_rejection: bool,
    pub max_upload_bytes: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            realtime_url: DEFAULT_REALTIME_URL.to_string(),
            hcaptcha_site_key: None,
            reconnect_delay_ms: 1_000,
            abort_reconnect_delay_ms: 100,
            liveness_window_ms: 5_000,
            liveness_check_interval_ms: 5_000,
            retry_on_auth_rejection: false,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ClientConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn abort_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.abort_reconnect_delay_ms)
    }

    pub fn liveness_window(&self) -> Duration {
        Duration::from_millis(self.liveness_window_ms)
    }

    pub fn liveness_check_interval(&self) -> Duration {
        Duration::from_millis(self.liveness_check_interval_ms)
    }
}
