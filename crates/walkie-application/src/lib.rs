//! Application layer for Walkie.
//!
//! This crate provides the use cases that coordinate the domain types, the
//! REST client and the realtime session: authentication, conversation CRUD,
//! attachment intake, subscription payment and the [`ChatSurface`] facade
//! that front ends drive.

pub mod attachment_intake;
pub mod auth_session;
pub mod backend;
pub mod chat_surface;
pub mod conversation_service;
pub mod payment_watcher;

#[cfg(test)]
mod testing;

pub use auth_session::AuthSession;
pub use chat_surface::{ChatSurface, ChatSurfaceParts};
pub use conversation_service::ConversationService;
pub use payment_watcher::PaymentWatcher;
