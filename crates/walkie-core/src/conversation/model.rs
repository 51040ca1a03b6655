//! Conversation domain model.

use serde::{Deserialize, Serialize};

use super::turn::Turn;

/// Prefix of client-generated ids used before the backend confirms a create.
pub const PLACEHOLDER_ID_PREFIX: &str = "temp-";

/// A named, ordered collection of turns.
///
/// `turns` is `None` when only the summary has been loaded (the list endpoint
/// may omit transcripts).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Backend-assigned id, or a `temp-` placeholder.
    #[serde(rename = "chatid")]
    pub id: String,
    #[serde(rename = "chatname", default)]
    pub name: String,
    #[serde(rename = "messages", default, skip_serializing_if = "Option::is_none")]
    pub turns: Option<Vec<Turn>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl Conversation {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            turns: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Builds the optimistic record inserted before the create call returns.
    pub fn placeholder(name: impl Into<String>, now: i64) -> Self {
        Self {
            id: format!("{PLACEHOLDER_ID_PREFIX}{now}"),
            name: name.into(),
            turns: Some(Vec::new()),
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.id.starts_with(PLACEHOLDER_ID_PREFIX)
    }

    /// Turns in insertion order; empty when not loaded.
    pub fn turns(&self) -> &[Turn] {
        self.turns.as_deref().unwrap_or(&[])
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns().last()
    }

    /// Normalizes every turn timestamp to milliseconds.
    pub fn normalize_timestamps(&mut self, now: i64) {
        if let Some(turns) = self.turns.as_mut() {
            for turn in turns.iter_mut() {
                turn.timestamp = super::timestamp::normalize_timestamp(turn.timestamp, now);
            }
        }
    }
}
