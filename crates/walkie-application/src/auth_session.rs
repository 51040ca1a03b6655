//! Authenticated identity of the client.
//!
//! `AuthSession` owns the bearer credential (persisted through
//! [`CredentialStore`]) and the last fetched [`UserProfile`]. The credential is
//! also published on a `watch` channel so the chat surface can connect the
//! realtime session as soon as one becomes available.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use tokio::sync::{RwLock, watch};
use walkie_core::account::{AccountRefresh, UserProfile};
use walkie_core::notification::Notifier;
use walkie_infrastructure::api::ApiError;
use walkie_infrastructure::api::dto::{ChangePasswordRequest, ChangeUsernameRequest, LoginRequest};
use walkie_infrastructure::storage::CredentialStore;

use crate::backend::AccountBackend;

pub const LOGGED_IN_MESSAGE: &str = "Logged in successfully";
pub const LOGGED_OUT_MESSAGE: &str = "Logged out successfully";
pub const NOT_LOGGED_IN_MESSAGE: &str = "You are not logged in.";
pub const PASSWORD_CHANGED_MESSAGE: &str = "Password updated successfully";
pub const USERNAME_CHANGED_MESSAGE: &str = "Username updated successfully";

pub struct AuthSession {
    backend: Arc<dyn AccountBackend>,
    credentials: CredentialStore,
    notifier: Notifier,
    token: watch::Sender<Option<String>>,
    profile: RwLock<Option<UserProfile>>,
}

impl AuthSession {
    pub fn new(
        backend: Arc<dyn AccountBackend>,
        credentials: CredentialStore,
        notifier: Notifier,
    ) -> Self {
        let (token, _) = watch::channel(None);
        Self {
            backend,
            credentials,
            notifier,
            token,
            profile: RwLock::new(None),
        }
    }

    /// Current bearer credential.
    pub fn token(&self) -> Option<String> {
        self.token.borrow().clone()
    }

    pub fn watch_token(&self) -> watch::Receiver<Option<String>> {
        self.token.subscribe()
    }

    pub async fn profile(&self) -> Option<UserProfile> {
        self.profile.read().await.clone()
    }

    /// Whether a profile has been loaded for the current credential.
    pub async fn is_logged_in(&self) -> bool {
        self.token.borrow().is_some() && self.profile.read().await.is_some()
    }

    /// Resumes the session persisted by an earlier login.
    ///
    /// Returns `true` when a stored credential was found and still accepted.
    pub async fn restore(&self) -> Result<bool> {
        let stored = self
            .credentials
            .load()
            .context("Failed to read stored credential")?;
        let Some(token) = stored else {
            tracing::debug!("[AuthSession] No stored credential");
            return Ok(false);
        };

        self.token.send_replace(Some(token));
        Ok(self.refresh_user().await.is_some())
    }

    pub async fn login(&self, username: &str, password: &str, hcaptcha: &str) -> Result<UserProfile> {
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
            hcaptcha: hcaptcha.to_string(),
        };
        let response = match self.backend.login(&request).await {
            Ok(response) => response,
            Err(e) => {
                if let ApiError::Rejected { message, .. } = &e {
                    self.notifier.error(message.clone());
                }
                return Err(e.into());
            }
        };

        if let Err(e) = self.credentials.save(&response.token) {
            tracing::warn!("[AuthSession] Failed to persist credential: {}", e);
        }
        self.token.send_replace(Some(response.token));
        self.notifier.success(LOGGED_IN_MESSAGE);
        tracing::info!("[AuthSession] Logged in as {}", username);

        self.refresh_user()
            .await
            .ok_or_else(|| anyhow!("Failed to load profile for {}", username))
    }

    /// Forgets the credential and the profile.
    pub async fn logout(&self) {
        if let Err(e) = self.credentials.clear() {
            tracing::warn!("[AuthSession] Failed to remove stored credential: {}", e);
        }
        self.token.send_replace(None);
        *self.profile.write().await = None;
        self.notifier.success(LOGGED_OUT_MESSAGE);
        tracing::info!("[AuthSession] Logged out");
    }

    pub async fn change_password(&self, old_password: &str, new_password: &str) -> Result<()> {
        let token = self.require_token()?;
        let request = ChangePasswordRequest {
            oldpassword: old_password.to_string(),
            newpassword: new_password.to_string(),
        };
        let result = self.backend.change_password(&request, &token).await;
        self.report(result)?;
        self.notifier.success(PASSWORD_CHANGED_MESSAGE);
        Ok(())
    }

    /// Renames the account and reloads the profile so the new name shows.
    pub async fn change_username(&self, username: &str) -> Result<()> {
        let token = self.require_token()?;
        let request = ChangeUsernameRequest {
            username: username.to_string(),
        };
        let result = self.backend.change_username(&request, &token).await;
        self.report(result)?;
        self.refresh_user().await;
        self.notifier.success(USERNAME_CHANGED_MESSAGE);
        tracing::info!("[AuthSession] Username changed to {}", username);
        Ok(())
    }

    fn require_token(&self) -> Result<String> {
        match self.token() {
            Some(token) => Ok(token),
            None => {
                self.notifier.error(NOT_LOGGED_IN_MESSAGE);
                bail!(NOT_LOGGED_IN_MESSAGE)
            }
        }
    }

    /// Shows a rejection's backend message; other failures were already
    /// reported by the client.
    fn report(&self, result: std::result::Result<(), ApiError>) -> Result<()> {
        if let Err(ApiError::Rejected { message, .. }) = &result {
            self.notifier.error(message.clone());
        }
        Ok(result?)
    }

    /// Re-fetches `/me`.
    ///
    /// A rejected credential logs the session out. Transport failures keep
    /// the current profile.
    pub async fn refresh_user(&self) -> Option<UserProfile> {
        let Some(token) = self.token() else {
            self.notifier.error(NOT_LOGGED_IN_MESSAGE);
            return None;
        };

        match self.backend.profile(&token).await {
            Ok(profile) => {
                *self.profile.write().await = Some(profile.clone());
                Some(profile)
            }
            Err(ApiError::Rejected { message, .. }) => {
                tracing::info!("[AuthSession] Credential no longer valid: {}", message);
                self.logout().await;
                None
            }
            Err(e) => {
                tracing::warn!("[AuthSession] Profile refresh failed: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl AccountRefresh for AuthSession {
    async fn refresh_account(&self) {
        if self.token.borrow().is_none() {
            return;
        }
        self.refresh_user().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBackend, profile, rejected};
    use tempfile::TempDir;
    use walkie_infrastructure::api::dto::LoginResponse;

    fn session(backend: Arc<FakeBackend>, dir: &TempDir) -> (AuthSession, Notifier) {
        let notifier = Notifier::new();
        let credentials = CredentialStore::at(dir.path().join("credential.toml"));
        (AuthSession::new(backend, credentials, notifier.clone()), notifier)
    }

    #[tokio::test]
    async fn test_login_persists_credential_and_loads_profile() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(FakeBackend::default());
        *backend.login_result.lock().unwrap() = Some(Ok(LoginResponse {
            token: "tok-1".to_string(),
            message: None,
        }));
        let (auth, notifier) = session(backend.clone(), &dir);
        let mut notes = notifier.subscribe();

        let user = auth.login("ada", "pw", "captcha").await.unwrap();

        assert_eq!(user.username, "ada");
        assert_eq!(auth.token().as_deref(), Some("tok-1"));
        assert!(auth.is_logged_in().await);
        assert_eq!(notes.try_recv().unwrap().message, LOGGED_IN_MESSAGE);

        let stored = CredentialStore::at(dir.path().join("credential.toml"));
        assert_eq!(stored.load().unwrap().as_deref(), Some("tok-1"));
    }

    #[tokio::test]
    async fn test_failed_login_keeps_logged_out() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(FakeBackend::default());
        let (auth, _) = session(backend, &dir);

        assert!(auth.login("ada", "wrong", "captcha").await.is_err());
        assert_eq!(auth.token(), None);
        assert!(!auth.is_logged_in().await);
    }

    #[tokio::test]
    async fn test_restore_resumes_stored_credential() {
        let dir = TempDir::new().unwrap();
        CredentialStore::at(dir.path().join("credential.toml"))
            .save("tok-old")
            .unwrap();
        let backend = Arc::new(FakeBackend::default());
        let (auth, _) = session(backend, &dir);

        assert!(auth.restore().await.unwrap());
        assert_eq!(auth.token().as_deref(), Some("tok-old"));
        assert_eq!(auth.profile().await, Some(profile("ada")));
    }

    #[tokio::test]
    async fn test_rejected_refresh_logs_out() {
        let dir = TempDir::new().unwrap();
        CredentialStore::at(dir.path().join("credential.toml"))
            .save("tok-expired")
            .unwrap();
        let backend = Arc::new(FakeBackend::default());
        *backend.profile_result.lock().unwrap() = Some(Err(rejected("Invalid token")));
        let (auth, notifier) = session(backend, &dir);
        let mut notes = notifier.subscribe();

        assert!(!auth.restore().await.unwrap());
        assert_eq!(auth.token(), None);
        assert_eq!(notes.try_recv().unwrap().message, LOGGED_OUT_MESSAGE);
        let stored = CredentialStore::at(dir.path().join("credential.toml"));
        assert_eq!(stored.load().unwrap(), None);
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_session() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(FakeBackend::default());
        let (auth, _) = session(backend.clone(), &dir);
        auth.token.send_replace(Some("tok".to_string()));
        auth.refresh_user().await.unwrap();

        *backend.profile_result.lock().unwrap() =
            Some(Err(ApiError::Transport("offline".to_string())));
        assert!(auth.refresh_user().await.is_none());
        assert_eq!(auth.token().as_deref(), Some("tok"));
        assert!(auth.profile().await.is_some());
    }

    #[tokio::test]
    async fn test_change_username_reloads_profile() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(FakeBackend::default());
        let (auth, notifier) = session(backend.clone(), &dir);
        auth.token.send_replace(Some("tok".to_string()));
        *backend.profile_result.lock().unwrap() = Some(Ok(profile("grace")));
        let mut notes = notifier.subscribe();

        auth.change_username("grace").await.unwrap();

        assert_eq!(*backend.account_changes.lock().unwrap(), vec!["username:grace"]);
        assert_eq!(auth.profile().await.unwrap().username, "grace");
        assert_eq!(notes.try_recv().unwrap().message, USERNAME_CHANGED_MESSAGE);
    }

    #[tokio::test]
    async fn test_rejected_password_change_shows_backend_message() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(FakeBackend::default());
        *backend.account_change_error.lock().unwrap() = Some(rejected("Current password is wrong"));
        let (auth, notifier) = session(backend.clone(), &dir);
        auth.token.send_replace(Some("tok".to_string()));
        let mut notes = notifier.subscribe();

        assert!(auth.change_password("old", "new").await.is_err());

        assert_eq!(notes.try_recv().unwrap().message, "Current password is wrong");
        assert!(notes.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_account_changes_need_a_login() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(FakeBackend::default());
        let (auth, notifier) = session(backend.clone(), &dir);
        let mut notes = notifier.subscribe();

        assert!(auth.change_password("old", "new").await.is_err());

        assert_eq!(notes.try_recv().unwrap().message, NOT_LOGGED_IN_MESSAGE);
        assert!(backend.account_changes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_background_refresh_is_silent_when_logged_out() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(FakeBackend::default());
        let (auth, notifier) = session(backend.clone(), &dir);
        let mut notes = notifier.subscribe();

        auth.refresh_account().await;

        assert_eq!(backend.profile_calls(), 0);
        assert!(notes.try_recv().is_err());
    }
}
