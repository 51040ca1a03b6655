pub mod api;
pub mod config_service;
pub mod paths;
pub mod storage;

pub use api::{ApiClient, ApiError};
pub use config_service::ConfigService;
pub use paths::WalkiePaths;
