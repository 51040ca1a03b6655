//! Observable connection state.

use serde::Serialize;
use strum::Display;

/// Lifecycle of the realtime connection as seen by the surface.
///
/// `Idle → Connecting → AwaitingAuth → Authenticated`, then either
/// `Closing → Idle` on an intentional teardown or `Disconnected` on any
/// other closure, from which a reconnect is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    AwaitingAuth,
    Authenticated,
    Closing,
    Disconnected,
}

impl ConnectionState {
    /// Whether a transport exists (authenticated or not).
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::AwaitingAuth | ConnectionState::Authenticated)
    }
}
