//! Incremental rendering of the active transcript.
//!
//! The store only says *that* it changed; [`TranscriptPrinter`] works out
//! what has not been printed yet, so a streamed assistant turn comes out as
//! one growing line.

use walkie_core::conversation::{SessionStore, TurnRole};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Another conversation became active.
    Opened { name: String },
    /// A turn not printed before.
    Turn { role: TurnRole, text: String },
    /// More text for the turn printed last.
    Continue(String),
}

#[derive(Debug, Default)]
pub struct TranscriptPrinter {
    conversation: Option<String>,
    printed_turns: usize,
    printed_len: usize,
}

impl TranscriptPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, store: &SessionStore) -> Vec<Fragment> {
        let Some(active) = store.active() else {
            self.reset(None);
            return Vec::new();
        };

        let mut fragments = Vec::new();
        if self.conversation.as_deref() != Some(active.id.as_str()) {
            self.reset(Some(active.id.clone()));
            fragments.push(Fragment::Opened {
                name: active.name.clone(),
            });
        }

        let turns = active.turns();
        if turns.len() < self.printed_turns {
            // Transcript was replaced by a reload.
            self.printed_turns = 0;
            self.printed_len = 0;
        }

        if let Some(last) = self.printed_turns.checked_sub(1).and_then(|i| turns.get(i)) {
            let content = &last.content;
            if content.len() > self.printed_len && content.is_char_boundary(self.printed_len) {
                fragments.push(Fragment::Continue(content[self.printed_len..].to_string()));
                self.printed_len = content.len();
            }
        }

        for turn in &turns[self.printed_turns..] {
            fragments.push(Fragment::Turn {
                role: turn.role,
                text: turn.content.clone(),
            });
            self.printed_len = turn.content.len();
        }
        self.printed_turns = turns.len();
        fragments
    }

    fn reset(&mut self, conversation: Option<String>) {
        self.conversation = conversation;
        self.printed_turns = 0;
        self.printed_len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use walkie_core::conversation::{Conversation, Turn};

    fn store_with(turns: Vec<Turn>) -> SessionStore {
        let mut store = SessionStore::new();
        let mut chat = Conversation::new("c1", "Chat");
        chat.turns = Some(turns);
        store.load_conversation_list(vec![chat.clone()]);
        store.set_active_conversation(Some(chat));
        store
    }

    #[test]
    fn test_streamed_turn_prints_only_new_text() {
        let mut printer = TranscriptPrinter::new();
        let mut store = store_with(vec![Turn::user("hi")]);

        assert_eq!(
            printer.advance(&store),
            vec![
                Fragment::Opened { name: "Chat".into() },
                Fragment::Turn {
                    role: TurnRole::User,
                    text: "hi".into()
                },
            ]
        );

        store.append_turn(Turn::assistant("Hel"));
        assert_eq!(
            printer.advance(&store),
            vec![Fragment::Turn {
                role: TurnRole::Assistant,
                text: "Hel".into()
            }]
        );

        store.merge_into_last_assistant_turn(Turn::assistant("Hello"));
        assert_eq!(printer.advance(&store), vec![Fragment::Continue("lo".into())]);
        assert!(printer.advance(&store).is_empty());
    }

    #[test]
    fn test_switching_conversation_reprints() {
        let mut printer = TranscriptPrinter::new();
        let mut store = store_with(vec![Turn::user("one")]);
        printer.advance(&store);

        let mut other = Conversation::new("c2", "Other");
        other.turns = Some(vec![Turn::user("two")]);
        store.set_active_conversation(Some(other));

        let fragments = printer.advance(&store);
        assert_eq!(fragments[0], Fragment::Opened { name: "Other".into() });
        assert_eq!(fragments.len(), 2);

        store.set_active_conversation(None);
        assert!(printer.advance(&store).is_empty());
    }
}
