use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use rustyline::Editor;
use strum::IntoEnumIterator;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use walkie_application::{ChatSurface, ChatSurfaceParts};
use walkie_core::conversation::TurnRole;
use walkie_core::model_selection::Provider;
use walkie_core::notification::{NotificationLevel, Notifier};
use walkie_infrastructure::storage::{CredentialStore, PreferenceStore};
use walkie_infrastructure::{ApiClient, ConfigService};
use walkie_interaction::realtime::WsConnector;

mod commands;
mod helper;
mod render;

use commands::{COMMANDS, Command};
use helper::CliHelper;
use render::{Fragment, TranscriptPrinter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Prints notifications as they arrive.
fn spawn_notification_printer(notifier: &Notifier) -> tokio::task::JoinHandle<()> {
    let mut notes = notifier.subscribe();
    tokio::spawn(async move {
        loop {
            match notes.recv().await {
                Ok(note) => match note.level {
                    NotificationLevel::Success => println!("{}", note.message.bright_green()),
                    NotificationLevel::Info => println!("{}", note.message.bright_black()),
                    NotificationLevel::Error => println!("{}", note.message.red()),
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("[walkie] Skipped {} notifications", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Re-renders the active transcript whenever the store changes.
fn spawn_transcript_printer(surface: Arc<ChatSurface>) -> tokio::task::JoinHandle<()> {
    let mut revisions = surface.store().subscribe();
    tokio::spawn(async move {
        let mut printer = TranscriptPrinter::new();
        let mut line_open = false;
        loop {
            let snapshot = surface.store().snapshot().await;
            for fragment in printer.advance(&snapshot) {
                if line_open && !matches!(fragment, Fragment::Continue(_)) {
                    println!();
                    line_open = false;
                }
                match fragment {
                    Fragment::Opened { name } => {
                        println!("{}", format!("── {} ──", name).bright_yellow())
                    }
                    Fragment::Turn { role, text } => match role {
                        TurnRole::User => println!("{}", format!("> {}", text).green()),
                        TurnRole::Assistant => {
                            print!("{}", text.bright_blue());
                            line_open = true;
                        }
                        TurnRole::Error => println!("{}", text.red()),
                    },
                    Fragment::Continue(text) => {
                        print!("{}", text.bright_blue());
                        line_open = true;
                    }
                }
            }
            if line_open && !surface.is_streaming() {
                println!();
                line_open = false;
            }
            let _ = std::io::stdout().flush();

            if revisions.changed().await.is_err() {
                break;
            }
        }
    })
}

fn print_help() {
    println!("{}", "Commands:".bright_yellow());
    for (name, args) in COMMANDS {
        println!("  {} {}", name.yellow(), args.bright_black());
    }
    println!("  {}", "Anything else is sent to the open chat.".yellow());
}

async fn print_chats(surface: &ChatSurface) {
    let store = surface.store().read().await;
    if store.conversations().is_empty() {
        println!("{}", "No chats yet. Create one with /new <name>".bright_black());
    }
    for conversation in store.conversations() {
        let marker = if store.active_id() == Some(conversation.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{} {}  {}", marker, conversation.id.cyan(), conversation.name);
    }
}

async fn print_models(surface: &ChatSurface) {
    let current = surface.model().await;
    for provider in Provider::iter().filter(|p| *p != Provider::None) {
        println!("{}", provider.to_string().bright_yellow());
        for model in provider.models() {
            let marker = if current.provider == provider && current.model == *model {
                "*"
            } else {
                " "
            };
            println!("  {} {}", marker, model);
        }
    }
}

/// Runs one REPL command. Returns `false` to leave the loop.
async fn dispatch(surface: &ChatSurface, command: Command) -> bool {
    // Failures are already shown through the notifier.
    let outcome = match command {
        Command::Quit => return false,
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Login {
            username,
            password,
            captcha,
        } => {
            surface
                .login(&username, &password, captcha.as_deref().unwrap_or_default())
                .await
        }
        Command::Logout => {
            surface.logout().await;
            Ok(())
        }
        Command::Me => {
            match surface.profile().await {
                Some(profile) => println!(
                    "{} <{}>  credits: {}  messages left: {}",
                    profile.username.bright_white(),
                    profile.email,
                    profile.credits,
                    profile.remaining_messages()
                ),
                None => println!("{}", "Not logged in".bright_black()),
            }
            Ok(())
        }
        Command::ChangePassword {
            old_password,
            new_password,
        } => surface.change_password(&old_password, &new_password).await,
        Command::ChangeUsername(username) => surface.change_username(&username).await,
        Command::Chats => match surface.reload_conversations().await {
            Ok(_) => {
                print_chats(surface).await;
                Ok(())
            }
            Err(e) => Err(e),
        },
        Command::New(name) => surface.create_conversation(&name).await.map(|_| ()),
        Command::Open(id) => surface.open_conversation(&id).await.map(|_| ()),
        Command::Delete(id) => surface.delete_conversation(&id).await,
        Command::ListModels => {
            print_models(surface).await;
            Ok(())
        }
        Command::Model(selection) => surface.select_model(selection).await,
        Command::Attach(path) => surface.attach_file(&path).await.map(|attachment| {
            println!("{}", format!("[{}]", attachment.file_name).bright_magenta());
        }),
        Command::Detach => {
            surface.clear_attachment().await;
            Ok(())
        }
        Command::Abort => {
            surface.abort();
            Ok(())
        }
        Command::Say(text) => surface.send_message(&text).await,
    };

    if let Err(e) = outcome {
        tracing::debug!("[walkie] {:#}", e);
    }
    true
}

/// Entry point of the Walkie terminal client.
///
/// Builds the chat surface from `~/.config/walkie`, mounts it (which resumes
/// a stored login and connects the realtime session), then reads commands
/// and messages until `/quit` or end of input.
#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = ConfigService::new().get_config();
    let notifier = Notifier::new();
    let api = ApiClient::new(&config.api_url, notifier.clone());
    let parts = ChatSurfaceParts::from_api(
        config,
        api,
        Arc::new(WsConnector),
        CredentialStore::new()?,
        PreferenceStore::new()?,
        notifier.clone(),
    );
    let surface = Arc::new(ChatSurface::new(parts));

    let notifications = spawn_notification_printer(&notifier);
    let transcript = spawn_transcript_printer(surface.clone());

    if let Err(e) = surface.mount().await {
        eprintln!("{}", format!("Failed to load chats: {:#}", e).red());
    }

    println!("{}", "Walkie terminal client. Type /help for commands.".bright_green());

    let mut rl = Editor::new()?;
    rl.set_helper(Some(CliHelper::new()));

    loop {
        match rl.readline(&format!("{} ", ">".bright_white())) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(trimmed);

                match Command::parse(trimmed) {
                    Ok(command) => {
                        if !dispatch(&surface, command).await {
                            break;
                        }
                    }
                    Err(usage) => println!("{}", usage.yellow()),
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                if surface.is_streaming() {
                    surface.abort();
                } else {
                    println!("{}", "CTRL-C detected. Type /quit to exit.".yellow());
                }
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!("{}", "CTRL-D detected. Exiting...".bright_green());
                break;
            }
            Err(err) => {
                eprintln!("{}", format!("Error: {:?}", err).red());
                break;
            }
        }
    }

    surface.unmount().await;
    transcript.abort();
    notifications.abort();
    Ok(())
}
