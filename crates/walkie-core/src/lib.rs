pub mod account;
pub mod attachment;
pub mod config;
pub mod conversation;
pub mod error;
pub mod model_selection;
pub mod notification;
pub mod payment;

// Re-export common error type
pub use error::WalkieError;
