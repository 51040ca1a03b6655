//! Conversation CRUD backed by the REST API.
//!
//! Create and delete are optimistic: the [`SessionStore`] changes first and
//! is rolled back when the backend call fails.
//!
//! [`SessionStore`]: walkie_core::conversation::SessionStore

use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use walkie_core::conversation::timestamp::now_millis;
use walkie_core::conversation::{Conversation, SharedSessionStore};
use walkie_core::WalkieError;
use walkie_core::notification::Notifier;
use walkie_infrastructure::api::ApiError;

use crate::backend::ChatBackend;

pub const CHAT_NOT_FOUND_MESSAGE: &str = "This chat no longer exists";
pub const CREATE_FAILED_MESSAGE: &str = "Failed to create chat";
pub const DELETE_FAILED_MESSAGE: &str = "Failed to delete chat";
pub const DELETED_MESSAGE: &str = "Chat deleted successfully";

#[derive(Clone)]
pub struct ConversationService {
    backend: Arc<dyn ChatBackend>,
    store: SharedSessionStore,
    notifier: Notifier,
}

impl ConversationService {
    pub fn new(backend: Arc<dyn ChatBackend>, store: SharedSessionStore, notifier: Notifier) -> Self {
        Self {
            backend,
            store,
            notifier,
        }
    }

    /// Replaces the conversation list with the backend's. Returns its length.
    pub async fn load_conversations(
        &self,
        token: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<usize> {
        let conversations = match self.backend.list_chats(token, cancel).await {
            Ok(conversations) => conversations,
            Err(e) => {
                if let ApiError::Rejected { message, .. } = &e {
                    self.notifier.error(message.clone());
                }
                return Err(e.into());
            }
        };
        let count = conversations.len();
        self.store
            .update(move |store| store.load_conversation_list(conversations))
            .await;
        tracing::debug!("[ConversationService] Loaded {} conversations", count);
        Ok(count)
    }

    /// Fetches a transcript and makes the conversation active.
    ///
    /// While the fetch runs the conversation is active with an empty
    /// transcript. A failed fetch clears the active conversation.
    pub async fn open_conversation(
        &self,
        id: &str,
        token: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<Conversation> {
        self.store
            .update(|store| {
                if let Some(mut loading) = store.find(id).cloned() {
                    loading.turns = Some(Vec::new());
                    store.set_active_conversation(Some(loading));
                }
            })
            .await;

        let fetched = match self.backend.get_chat(id, token, cancel).await {
            Ok(conversation) => conversation,
            Err(e) if e.is_cancelled() => return Err(e.into()),
            Err(e) => {
                tracing::warn!("[ConversationService] Failed to open {}: {}", id, e);
                self.notifier.error(CHAT_NOT_FOUND_MESSAGE);
                self.store
                    .update(|store| {
                        if store.active_id() == Some(id) {
                            store.set_active_conversation(None);
                        }
                    })
                    .await;
                return Err(e.into());
            }
        };

        let active = self
            .store
            .update(move |store| {
                let active = match store.put_conversation(fetched.clone()) {
                    Some(stored) => stored,
                    None => {
                        let mut fetched = fetched;
                        fetched.normalize_timestamps(now_millis());
                        fetched
                    }
                };
                store.set_active_conversation(Some(active.clone()));
                active
            })
            .await;
        Ok(active)
    }

    /// Creates a conversation, showing it immediately under a placeholder id.
    pub async fn create_conversation(&self, name: &str, token: &str) -> Result<Conversation> {
        let ticket = self.store.update(|store| store.insert_placeholder(name)).await;
        tracing::debug!("[ConversationService] Inserted placeholder {}", ticket.id);

        match self.backend.create_chat(name, token).await {
            Ok(mut created) => {
                created.normalize_timestamps(now_millis());
                if created.turns.is_none() {
                    created.turns = Some(Vec::new());
                }
                let confirmed = created.clone();
                let replaced = self
                    .store
                    .update(move |store| store.confirm_placeholder(&ticket, confirmed))
                    .await;
                if !replaced {
                    tracing::debug!(
                        "[ConversationService] Placeholder gone before {} was confirmed",
                        created.id
                    );
                }
                Ok(created)
            }
            Err(e) => {
                self.store
                    .update(move |store| store.discard_placeholder(&ticket))
                    .await;
                self.notify_failure(&e, CREATE_FAILED_MESSAGE);
                Err(e.into())
            }
        }
    }

    /// Deletes a conversation, removing it before the backend confirms.
    pub async fn delete_conversation(&self, id: &str, token: &str) -> Result<()> {
        let removed = self
            .store
            .update(|store| store.remove_conversation(id))
            .await
            .ok_or_else(|| WalkieError::NotFound(id.to_string()))?;

        match self.backend.delete_chat(id, token).await {
            Ok(()) => {
                self.notifier.success(DELETED_MESSAGE);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("[ConversationService] Delete of {} failed: {}", id, e);
                self.store
                    .update(move |store| store.restore_conversation(removed))
                    .await;
                self.notify_failure(&e, DELETE_FAILED_MESSAGE);
                Err(e.into())
            }
        }
    }

    fn notify_failure(&self, error: &ApiError, fallback: &str) {
        match error {
            ApiError::Cancelled => {}
            ApiError::Rejected { message, .. } if !message.is_empty() => {
                self.notifier.error(message.clone())
            }
            _ => self.notifier.error(fallback),
        }
    }
}
