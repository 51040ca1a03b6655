//! Conversation domain module.
//!
//! # Module Structure
//!
//! - `model`: the `Conversation` record
//! - `turn`: transcript entries (`Turn`, `TurnRole`, `AttachmentRef`)
//! - `timestamp`: second/millisecond normalization
//! - `store`: the synchronous `SessionStore` state container
//! - `shared`: `SharedSessionStore`, the observable handle passed around

mod model;
mod shared;
mod store;
pub mod timestamp;
mod turn;

pub use model::{Conversation, PLACEHOLDER_ID_PREFIX};
pub use shared::SharedSessionStore;
pub use store::{PlaceholderTicket, RemovedConversation, SessionStore};
pub use turn::{AttachmentRef, Turn, TurnRole};
