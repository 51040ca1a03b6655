//! The session store.
//!
//! `SessionStore` is the single authoritative holder of the conversation list
//! and the active conversation. Every mutation is a synchronous state
//! transition; sharing and change notification live in
//! [`SharedSessionStore`](super::SharedSessionStore).
//!
//! The active conversation is kept as its own record (it may have been fetched
//! with a full transcript while the list only holds a summary). Turn mutations
//! are mirrored into the matching list entry so both views stay consistent.

use super::model::Conversation;
use super::timestamp::now_millis;
use super::turn::{Turn, TurnRole};

/// Handle returned by [`SessionStore::insert_placeholder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderTicket {
    /// Position the placeholder was inserted at.
    pub index: usize,
    /// The temporary id.
    pub id: String,
}

/// Everything needed to undo an optimistic removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedConversation {
    pub index: usize,
    pub conversation: Conversation,
    pub was_active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStore {
    conversations: Vec<Conversation>,
    active: Option<Conversation>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn active(&self) -> Option<&Conversation> {
        self.active.as_ref()
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active.as_ref().map(|c| c.id.as_str())
    }

    /// Last turn of the active conversation.
    pub fn last_turn(&self) -> Option<&Turn> {
        self.active.as_ref().and_then(Conversation::last_turn)
    }

    pub fn find(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    /// Replaces the conversation list wholesale, normalizing turn timestamps.
    pub fn load_conversation_list(&mut self, mut conversations: Vec<Conversation>) {
        let now = now_millis();
        for conversation in conversations.iter_mut() {
            conversation.normalize_timestamps(now);
        }
        self.conversations = conversations;
    }

    /// Stores a freshly fetched transcript into the matching list entry.
    /// Unknown ids are ignored. Returns the normalized record.
    pub fn put_conversation(&mut self, mut conversation: Conversation) -> Option<Conversation> {
        conversation.normalize_timestamps(now_millis());
        let entry = self
            .conversations
            .iter_mut()
            .find(|c| c.id == conversation.id)?;
        *entry = conversation.clone();
        Some(conversation)
    }

    /// Replaces the active pointer. The list is not touched.
    pub fn set_active_conversation(&mut self, conversation: Option<Conversation>) {
        self.active = conversation;
    }

    /// Inserts an optimistic placeholder at the end of the list and makes it
    /// active.
    pub fn insert_placeholder(&mut self, name: &str) -> PlaceholderTicket {
        let placeholder = Conversation::placeholder(name, now_millis());
        let ticket = PlaceholderTicket {
            index: self.conversations.len(),
            id: placeholder.id.clone(),
        };
        self.conversations.push(placeholder.clone());
        self.active = Some(placeholder);
        ticket
    }

    /// Replaces the placeholder with the server-confirmed record.
    ///
    /// The placeholder is located by its recorded position; if the list has
    /// shifted since, it is located by its temporary id instead. Returns
    /// `false` when the placeholder is gone (e.g. deleted meanwhile).
    pub fn confirm_placeholder(
        &mut self,
        ticket: &PlaceholderTicket,
        confirmed: Conversation,
    ) -> bool {
        let Some(index) = self.placeholder_position(ticket) else {
            return false;
        };
        if self.active_id() == Some(ticket.id.as_str()) {
            self.active = Some(confirmed.clone());
        }
        self.conversations[index] = confirmed;
        true
    }

    /// Rolls back an optimistic create.
    pub fn discard_placeholder(&mut self, ticket: &PlaceholderTicket) {
        if let Some(index) = self.placeholder_position(ticket) {
            self.conversations.remove(index);
        }
        if self.active_id() == Some(ticket.id.as_str()) {
            self.active = None;
        }
    }

    fn placeholder_position(&self, ticket: &PlaceholderTicket) -> Option<usize> {
        match self.conversations.get(ticket.index) {
            Some(c) if c.id == ticket.id => Some(ticket.index),
            _ => self.conversations.iter().position(|c| c.id == ticket.id),
        }
    }

    /// Optimistically removes a conversation, clearing it as active if needed.
    pub fn remove_conversation(&mut self, id: &str) -> Option<RemovedConversation> {
        let index = self.conversations.iter().position(|c| c.id == id)?;
        let conversation = self.conversations.remove(index);
        let was_active = self.active_id() == Some(id);
        if was_active {
            self.active = None;
        }
        Some(RemovedConversation {
            index,
            conversation,
            was_active,
        })
    }

    /// Undoes [`remove_conversation`](Self::remove_conversation): the record
    /// goes back to its original position and regains active status if
    /// nothing else became active meanwhile.
    pub fn restore_conversation(&mut self, removed: RemovedConversation) {
        let index = removed.index.min(self.conversations.len());
        if removed.was_active && self.active.is_none() {
            self.active = Some(removed.conversation.clone());
        }
        self.conversations.insert(index, removed.conversation);
    }

    /// Appends a turn to the active conversation. No-op without one.
    pub fn append_turn(&mut self, turn: Turn) -> bool {
        let now = now_millis();
        let turn = turn.normalized(now);
        self.mutate_active(now, |turns| {
            turns.push(turn);
            true
        })
    }

    /// Replaces the last turn of the active conversation if it is an
    /// assistant turn. Concatenation is the caller's job.
    pub fn merge_into_last_assistant_turn(&mut self, turn: Turn) -> bool {
        let now = now_millis();
        let turn = turn.normalized(now);
        self.mutate_active(now, |turns| match turns.last_mut() {
            Some(last) if last.role == TurnRole::Assistant => {
                *last = turn;
                true
            }
            _ => false,
        })
    }

    pub fn append_error_turn(&mut self, text: impl Into<String>) -> bool {
        self.append_turn(Turn::error(text))
    }

    fn mutate_active<F>(&mut self, now: i64, f: F) -> bool
    where
        F: FnOnce(&mut Vec<Turn>) -> bool,
    {
        let Some(active) = self.active.as_mut() else {
            tracing::debug!("[SessionStore] No active conversation, dropping turn mutation");
            return false;
        };
        let changed = f(active.turns.get_or_insert_with(Vec::new));
        if !changed {
            return false;
        }
        active.updated_at = Some(now);

        let mirrored = active.clone();
        if let Some(entry) = self.conversations.iter_mut().find(|c| c.id == mirrored.id) {
            *entry = mirrored;
        }
        true
    }
}
