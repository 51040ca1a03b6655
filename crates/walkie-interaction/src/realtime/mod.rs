//! Realtime chat session.
//!
//! # Module Structure
//!
//! - `protocol`: inbound frame classification and the outbound turn frame
//! - `state`: the observable `ConnectionState`
//! - `transport`: `Transport`/`Connector` seam and the WebSocket implementation
//! - `memory`: in-memory transport pair
//! - `controller`: the session actor and its `RealtimeSession` handle
//! - `error`: `SendError` and user-facing texts

mod controller;
pub mod error;
pub mod memory;
pub mod protocol;
mod state;
pub mod transport;

pub use controller::{RealtimeConfig, RealtimeSession, SendRequest};
pub use error::SendError;
pub use state::ConnectionState;
pub use transport::{Connector, Transport, TransportError, WsConnector};
