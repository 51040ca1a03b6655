//! Shared, observable handle to the session store.

use std::sync::Arc;

use tokio::sync::{RwLock, RwLockReadGuard, watch};

use super::store::SessionStore;

/// Cloneable handle used by the realtime controller, the conversation
/// service and the chat surface.
///
/// Each [`update`](Self::update) runs under a single write lock, so a
/// read-then-mutate sequence inside the closure is atomic with respect to
/// other writers. Every update bumps a revision counter that subscribers can
/// await to re-render.
#[derive(Clone)]
pub struct SharedSessionStore {
    inner: Arc<RwLock<SessionStore>>,
    revision: Arc<watch::Sender<u64>>,
}

impl SharedSessionStore {
    pub fn new() -> Self {
        Self::from_store(SessionStore::new())
    }

    pub fn from_store(store: SessionStore) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(RwLock::new(store)),
            revision: Arc::new(revision),
        }
    }

    /// Applies a mutation and notifies subscribers.
    pub async fn update<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut SessionStore) -> R,
    {
        let result = {
            let mut store = self.inner.write().await;
            f(&mut store)
        };
        self.revision.send_modify(|rev| *rev += 1);
        result
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, SessionStore> {
        self.inner.read().await
    }

    /// Clones the current state.
    pub async fn snapshot(&self) -> SessionStore {
        self.inner.read().await.clone()
    }

    /// Receiver that changes whenever the store is mutated.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }
}

impl Default for SharedSessionStore {
    fn default() -> Self {
        Self::new()
    }
}
