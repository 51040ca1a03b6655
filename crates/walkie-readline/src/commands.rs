//! Parsing of REPL input lines.

use std::path::PathBuf;
use std::str::FromStr;

use walkie_core::model_selection::{ModelSelection, Provider};

/// Command names with their argument synopsis.
pub const COMMANDS: &[(&str, &str)] = &[
    ("/login", "<username> <password> [captcha]"),
    ("/logout", ""),
    ("/me", ""),
    ("/password", "<old password> <new password>"),
    ("/username", "<new username>"),
    ("/chats", ""),
    ("/new", "<name>"),
    ("/open", "<chat id>"),
    ("/delete", "<chat id>"),
    ("/model", "[<provider> <model>]"),
    ("/attach", "<path>"),
    ("/detach", ""),
    ("/abort", ""),
    ("/help", ""),
    ("/quit", ""),
];

/// Argument synopsis of `name`, if it is a command that takes arguments.
pub fn synopsis(name: &str) -> Option<&'static str> {
    COMMANDS
        .iter()
        .find(|(command, args)| *command == name && !args.is_empty())
        .map(|(_, args)| *args)
}

fn usage(name: &str) -> String {
    format!("usage: {} {}", name, synopsis(name).unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login {
        username: String,
        password: String,
        captcha: Option<String>,
    },
    Logout,
    Me,
    ChangePassword {
        old_password: String,
        new_password: String,
    },
    ChangeUsername(String),
    Chats,
    New(String),
    Open(String),
    Delete(String),
    ListModels,
    Model(ModelSelection),
    Attach(PathBuf),
    Detach,
    Abort,
    Help,
    Quit,
    /// Plain text: a message for the active conversation.
    Say(String),
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        if !line.starts_with('/') {
            return Ok(Command::Say(line.to_string()));
        }

        let (name, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();
        let args: Vec<&str> = rest.split_whitespace().collect();

        let command = match name {
            "/login" => match args.as_slice() {
                [username, password] => Command::Login {
                    username: username.to_string(),
                    password: password.to_string(),
                    captcha: None,
                },
                [username, password, captcha] => Command::Login {
                    username: username.to_string(),
                    password: password.to_string(),
                    captcha: Some(captcha.to_string()),
                },
                _ => return Err(usage(name)),
            },
            "/logout" => Command::Logout,
            "/me" => Command::Me,
            "/password" => match args.as_slice() {
                [old_password, new_password] => Command::ChangePassword {
                    old_password: old_password.to_string(),
                    new_password: new_password.to_string(),
                },
                _ => return Err(usage(name)),
            },
            "/username" => match args.as_slice() {
                [username] => Command::ChangeUsername(username.to_string()),
                _ => return Err(usage(name)),
            },
            "/chats" => Command::Chats,
            "/new" => Command::New(required(name, rest)?),
            "/open" => Command::Open(required(name, rest)?),
            "/delete" => Command::Delete(required(name, rest)?),
            "/model" => match args.as_slice() {
                [] => Command::ListModels,
                [provider, model] => {
                    let provider = Provider::from_str(provider)
                        .map_err(|_| format!("unknown provider: {}", provider))?;
                    Command::Model(ModelSelection::new(provider, *model))
                }
                _ => return Err(usage(name)),
            },
            "/attach" => Command::Attach(PathBuf::from(required(name, rest)?)),
            "/detach" => Command::Detach,
            "/abort" => Command::Abort,
            "/help" => Command::Help,
            "/quit" | "/exit" => Command::Quit,
            other => return Err(format!("unknown command: {}", other)),
        };
        Ok(command)
    }
}

fn required(name: &str, rest: &str) -> Result<String, String> {
    if rest.is_empty() {
        Err(usage(name))
    } else {
        Ok(rest.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_a_message() {
        assert_eq!(Command::parse("  hello there "), Ok(Command::Say("hello there".into())));
    }

    #[test]
    fn test_commands_with_arguments() {
        assert_eq!(
            Command::parse("/new Weekend plans"),
            Ok(Command::New("Weekend plans".into()))
        );
        assert_eq!(
            Command::parse("/model anthropic claude-3-opus-20240229"),
            Ok(Command::Model(ModelSelection::new(
                Provider::Anthropic,
                "claude-3-opus-20240229"
            )))
        );
        assert_eq!(Command::parse("/model"), Ok(Command::ListModels));
        assert_eq!(
            Command::parse("/login ada secret"),
            Ok(Command::Login {
                username: "ada".into(),
                password: "secret".into(),
                captcha: None
            })
        );
    }

    #[test]
    fn test_account_commands() {
        assert_eq!(
            Command::parse("/password old new"),
            Ok(Command::ChangePassword {
                old_password: "old".into(),
                new_password: "new".into()
            })
        );
        assert_eq!(
            Command::parse("/username grace"),
            Ok(Command::ChangeUsername("grace".into()))
        );
        assert_eq!(
            Command::parse("/password onlyone"),
            Err("usage: /password <old password> <new password>".to_string())
        );
    }

    #[test]
    fn test_usage_errors() {
        assert_eq!(Command::parse("/open"), Err("usage: /open <chat id>".to_string()));
        assert!(Command::parse("/model nobody x").is_err());
        assert!(Command::parse("/frobnicate").is_err());
    }
}
