//! Line-editor helper: command and argument completion, synopsis hints.

use std::borrow::Cow::{self, Borrowed, Owned};
use std::str::FromStr;

use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};
use strum::IntoEnumIterator;
use walkie_core::model_selection::Provider;

use crate::commands::{COMMANDS, synopsis};

/// Candidates for the word under the cursor.
struct Suggestions {
    /// Byte offset in the line where the word starts.
    start: usize,
    /// What has been typed of the word so far.
    typed: String,
    words: Vec<String>,
}

#[derive(Clone)]
pub struct CliHelper {
    commands: Vec<String>,
    providers: Vec<Provider>,
}

impl CliHelper {
    pub fn new() -> Self {
        Self {
            commands: COMMANDS.iter().map(|(name, _)| name.to_string()).collect(),
            providers: Provider::iter().filter(|p| *p != Provider::None).collect(),
        }
    }

    fn suggestions(&self, line: &str) -> Option<Suggestions> {
        let Some((name, args)) = line.split_once(' ') else {
            if !line.starts_with('/') {
                return None;
            }
            let words = self
                .commands
                .iter()
                .filter(|cmd| cmd.starts_with(line))
                .cloned()
                .collect();
            return Some(Suggestions {
                start: 0,
                typed: line.to_string(),
                words,
            });
        };
        if name != "/model" {
            return None;
        }

        let offset = name.len() + 1;
        match args.split_once(' ') {
            None => Some(Suggestions {
                start: offset,
                typed: args.to_string(),
                words: self
                    .providers
                    .iter()
                    .map(Provider::to_string)
                    .filter(|p| p.starts_with(args))
                    .collect(),
            }),
            Some((provider, model)) if !model.contains(' ') => {
                let provider = Provider::from_str(provider).ok()?;
                Some(Suggestions {
                    start: offset + provider.to_string().len() + 1,
                    typed: model.to_string(),
                    words: provider
                        .models()
                        .iter()
                        .filter(|m| m.starts_with(model))
                        .map(|m| m.to_string())
                        .collect(),
                })
            }
            _ => None,
        }
    }

    fn candidates(&self, line: &str) -> (usize, Vec<Pair>) {
        match self.suggestions(line) {
            Some(suggestions) => (
                suggestions.start,
                suggestions
                    .words
                    .into_iter()
                    .map(|word| Pair {
                        display: word.clone(),
                        replacement: word,
                    })
                    .collect(),
            ),
            None => (0, vec![]),
        }
    }

    /// Remainder of the first matching word, or the synopsis of what comes
    /// next when nothing has been typed yet.
    fn hint_for(&self, line: &str) -> Option<String> {
        if let Some(suggestions) = self.suggestions(line) {
            if !suggestions.typed.is_empty() {
                return suggestions
                    .words
                    .iter()
                    .find(|word| word.len() > suggestions.typed.len())
                    .map(|word| word[suggestions.typed.len()..].to_string());
            }
        }

        let (name, args) = line.split_once(' ')?;
        if name == "/model" {
            return match args.split_once(' ') {
                None if args.is_empty() => synopsis(name).map(str::to_string),
                Some((_, "")) => Some("<model>".to_string()),
                _ => None,
            };
        }
        if args.is_empty() {
            synopsis(name).map(str::to_string)
        } else {
            None
        }
    }
}

impl Helper for CliHelper {}

impl Completer for CliHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        Ok(self.candidates(&line[..pos]))
    }
}

impl Highlighter for CliHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Owned(hint.bright_black().to_string())
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CliHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        if pos < line.len() {
            return None;
        }
        self.hint_for(line)
    }
}

impl Validator for CliHelper {}
