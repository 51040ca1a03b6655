//! Backend REST API.
//!
//! - `client`: `ApiClient` and the response envelope handling
//! - `auth`, `chat`, `payment`: endpoint groups
//! - `dto`: request/response bodies

mod auth;
mod chat;
mod client;
pub mod dto;
mod error;
mod payment;

pub use chat::UploadFile;
pub use client::{ApiClient, CONNECT_ERROR_MESSAGE, INTERNAL_ERROR_MESSAGE};
pub use error::ApiError;
