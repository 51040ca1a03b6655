pub mod realtime;

pub use realtime::{ConnectionState, RealtimeConfig, RealtimeSession, SendError, SendRequest};
