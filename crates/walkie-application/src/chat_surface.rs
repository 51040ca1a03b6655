//! The chat surface: everything a front end needs behind one facade.
//!
//! `ChatSurface` wires the session store, the authenticated identity, the
//! conversation service, attachment intake and the realtime session together
//! and exposes user intents (send, attach, abort, open/create/delete a
//! conversation, pick a model) as methods. Front ends render the
//! [`SharedSessionStore`] and the [`Notifier`] reactively.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Result, bail};
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use walkie_core::account::UserProfile;
use walkie_core::attachment::PendingAttachment;
use walkie_core::config::ClientConfig;
use walkie_core::conversation::{Conversation, SharedSessionStore};
use walkie_core::model_selection::ModelSelection;
use walkie_core::notification::Notifier;
use walkie_infrastructure::ApiClient;
use walkie_infrastructure::storage::{CredentialStore, PreferenceStore};
use walkie_interaction::realtime::Connector;
use walkie_interaction::{ConnectionState, RealtimeConfig, RealtimeSession, SendRequest};

use crate::attachment_intake::AttachmentIntake;
use crate::auth_session::AuthSession;
use crate::backend::{AccountBackend, ChatBackend, PaymentBackend};
use crate::conversation_service::ConversationService;
use crate::payment_watcher::PaymentWatcher;

pub const LOGIN_REQUIRED_MESSAGE: &str = "Please log in to continue";

/// Collaborators of a [`ChatSurface`].
pub struct ChatSurfaceParts {
    pub config: ClientConfig,
    pub account_backend: Arc<dyn AccountBackend>,
    pub chat_backend: Arc<dyn ChatBackend>,
    pub payment_backend: Arc<dyn PaymentBackend>,
    pub connector: Arc<dyn Connector>,
    pub credentials: CredentialStore,
    pub preferences: PreferenceStore,
    pub notifier: Notifier,
}

impl ChatSurfaceParts {
    /// Uses one [`ApiClient`] for every backend seam.
    pub fn from_api(
        config: ClientConfig,
        api: ApiClient,
        connector: Arc<dyn Connector>,
        credentials: CredentialStore,
        preferences: PreferenceStore,
        notifier: Notifier,
    ) -> Self {
        let api = Arc::new(api);
        Self {
            config,
            account_backend: api.clone(),
            chat_backend: api.clone(),
            payment_backend: api,
            connector,
            credentials,
            preferences,
            notifier,
        }
    }
}

pub struct ChatSurface {
    store: SharedSessionStore,
    notifier: Notifier,
    auth: Arc<AuthSession>,
    conversations: ConversationService,
    attachments: AttachmentIntake,
    payments: PaymentWatcher,
    session: RealtimeSession,
    preferences: PreferenceStore,
    model: RwLock<ModelSelection>,
    pending: Mutex<Option<PendingAttachment>>,
    opening: Mutex<Option<CancellationToken>>,
    credential_watch: Mutex<Option<JoinHandle<()>>>,
}

impl ChatSurface {
    /// Builds the surface and spawns the realtime controller. Must run
    /// inside a tokio runtime.
    pub fn new(parts: ChatSurfaceParts) -> Self {
        let ChatSurfaceParts {
            config,
            account_backend,
            chat_backend,
            payment_backend,
            connector,
            credentials,
            preferences,
            notifier,
        } = parts;

        let store = SharedSessionStore::new();
        let auth = Arc::new(AuthSession::new(account_backend, credentials, notifier.clone()));
        let session = RealtimeSession::spawn(
            RealtimeConfig::from(&config),
            connector,
            store.clone(),
            notifier.clone(),
            auth.clone(),
        );
        let model = match preferences.load() {
            Ok(prefs) => prefs.model,
            Err(e) => {
                tracing::warn!("[ChatSurface] Failed to load preferences: {}", e);
                ModelSelection::default()
            }
        };

        Self {
            conversations: ConversationService::new(
                chat_backend.clone(),
                store.clone(),
                notifier.clone(),
            ),
            attachments: AttachmentIntake::new(chat_backend, notifier.clone(), config.max_upload_bytes),
            payments: PaymentWatcher::new(payment_backend, notifier.clone(), auth.clone()),
            store,
            notifier,
            auth,
            session,
            preferences,
            model: RwLock::new(model),
            pending: Mutex::new(None),
            opening: Mutex::new(None),
            credential_watch: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &SharedSessionStore {
        &self.store
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn auth(&self) -> &AuthSession {
        &self.auth
    }

    pub fn payments(&self) -> &PaymentWatcher {
        &self.payments
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.session.state()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.session.watch_state()
    }

    pub fn is_streaming(&self) -> bool {
        self.session.is_streaming()
    }

    pub fn watch_streaming(&self) -> watch::Receiver<bool> {
        self.session.watch_streaming()
    }

    pub async fn model(&self) -> ModelSelection {
        self.model.read().await.clone()
    }

    pub async fn pending_attachment(&self) -> Option<PendingAttachment> {
        self.pending.lock().await.clone()
    }

    pub async fn profile(&self) -> Option<UserProfile> {
        self.auth.profile().await
    }

    /// Restores the stored login, starts following the credential and loads
    /// the conversation list.
    ///
    /// The realtime session connects whenever a credential is present and
    /// disconnects when it goes away.
    pub async fn mount(&self) -> Result<()> {
        if let Err(e) = self.auth.restore().await {
            tracing::warn!("[ChatSurface] {:#}", e);
        }

        let mut tokens = self.auth.watch_token();
        let session = self.session.clone();
        let follower = tokio::spawn(async move {
            loop {
                let token = tokens.borrow_and_update().clone();
                match token {
                    Some(token) => session.connect(token),
                    None => session.disconnect(),
                }
                if tokens.changed().await.is_err() {
                    break;
                }
            }
        });
        if let Some(previous) = self.credential_watch.lock().await.replace(follower) {
            previous.abort();
        }

        if let Some(token) = self.auth.token() {
            self.conversations.load_conversations(&token, None).await?;
        }
        tracing::debug!("[ChatSurface] Mounted");
        Ok(())
    }

    /// Stops the realtime session for good.
    pub async fn unmount(&self) {
        if let Some(follower) = self.credential_watch.lock().await.take() {
            follower.abort();
        }
        if let Some(opening) = self.opening.lock().await.take() {
            opening.cancel();
        }
        self.session.shutdown();
        tracing::debug!("[ChatSurface] Unmounted");
    }

    pub async fn login(&self, username: &str, password: &str, hcaptcha: &str) -> Result<()> {
        let profile = self.auth.login(username, password, hcaptcha).await?;
        tracing::debug!("[ChatSurface] {} has {} credits", profile.username, profile.credits);
        if let Some(token) = self.auth.token() {
            self.conversations.load_conversations(&token, None).await?;
        }
        Ok(())
    }

    /// Logs out, closes the connection and forgets the loaded conversations.
    pub async fn logout(&self) {
        self.session.disconnect();
        self.auth.logout().await;
        self.pending.lock().await.take();
        self.store
            .update(|store| {
                store.set_active_conversation(None);
                store.load_conversation_list(Vec::new());
            })
            .await;
    }

    pub async fn change_password(&self, old_password: &str, new_password: &str) -> Result<()> {
        self.auth.change_password(old_password, new_password).await
    }

    pub async fn change_username(&self, username: &str) -> Result<()> {
        self.auth.change_username(username).await
    }

    /// Sends `caption` (with the pending attachment, if any) to the active
    /// conversation. The attachment is cleared once the frame went out.
    pub async fn send_message(&self, caption: &str) -> Result<()> {
        if !self.auth.is_logged_in().await {
            self.notifier.error(LOGIN_REQUIRED_MESSAGE);
            bail!(LOGIN_REQUIRED_MESSAGE);
        }

        let conversation_id = self
            .store
            .read()
            .await
            .active_id()
            .map(str::to_string)
            .unwrap_or_default();
        let mut pending = self.pending.lock().await;
        let request = SendRequest {
            conversation_id,
            caption: caption.to_string(),
            model: self.model().await,
            attachment: pending.clone(),
        };

        self.session.send(request).await?;
        pending.take();
        Ok(())
    }

    /// Uploads a local file and keeps it for the next message.
    pub async fn attach_file(&self, path: &Path) -> Result<PendingAttachment> {
        let token = self.auth.token();
        let attachment = self
            .attachments
            .attach_path(path, token.as_deref(), None)
            .await?;
        *self.pending.lock().await = Some(attachment.clone());
        Ok(attachment)
    }

    pub async fn clear_attachment(&self) {
        self.pending.lock().await.take();
    }

    pub fn abort(&self) {
        self.session.abort();
    }

    /// Opens a conversation, cancelling a previous open still in flight.
    pub async fn open_conversation(&self, id: &str) -> Result<Conversation> {
        let token = self.require_token()?;
        let cancel = CancellationToken::new();
        if let Some(previous) = self.opening.lock().await.replace(cancel.clone()) {
            previous.cancel();
        }
        self.conversations
            .open_conversation(id, &token, Some(&cancel))
            .await
    }

    pub async fn create_conversation(&self, name: &str) -> Result<Conversation> {
        let token = self.require_token()?;
        self.conversations.create_conversation(name, &token).await
    }

    pub async fn delete_conversation(&self, id: &str) -> Result<()> {
        let token = self.require_token()?;
        self.conversations.delete_conversation(id, &token).await
    }

    pub async fn reload_conversations(&self) -> Result<usize> {
        let token = self.require_token()?;
        self.conversations.load_conversations(&token, None).await
    }

    /// Selects and persists the provider/model pair used for new turns.
    pub async fn select_model(&self, selection: ModelSelection) -> Result<()> {
        if !selection.provider.offers(&selection.model) {
            let message = format!(
                "Model {} is not offered by {}",
                selection.model, selection.provider
            );
            self.notifier.error(message.clone());
            bail!(message);
        }
        if let Err(e) = self.preferences.set_model(selection.clone()) {
            tracing::warn!("[ChatSurface] Failed to persist model selection: {}", e);
        }
        tracing::info!("[ChatSurface] Model {}/{}", selection.provider, selection.model);
        *self.model.write().await = selection;
        Ok(())
    }

    fn require_token(&self) -> Result<String> {
        match self.auth.token() {
            Some(token) => Ok(token),
            None => {
                self.notifier.error(LOGIN_REQUIRED_MESSAGE);
                bail!(LOGIN_REQUIRED_MESSAGE)
            }
        }
    }
}
