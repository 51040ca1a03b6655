//! File-backed client state.

pub mod atomic_toml;
pub mod credential_store;
pub mod preference_store;

pub use atomic_toml::{AtomicTomlFile, StorageError};
pub use credential_store::CredentialStore;
pub use preference_store::{PreferenceStore, Preferences};
