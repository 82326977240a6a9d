//! Interactive chat loop over a session store

use anyhow::Result;
use atlas_core::session::{Session, SessionId, SessionStore};
use atlas_core::Error;
use console::style;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

/// One line of interactive input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    New,
    List,
    Select(String),
    Delete(String),
    Help,
    Exit,
    Send(String),
    Unknown(String),
    Empty,
}

impl ChatCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ChatCommand::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return ChatCommand::Send(line.to_string());
        };

        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };

        match (name, arg) {
            ("new", _) => ChatCommand::New,
            ("list" | "ls", _) => ChatCommand::List,
            ("select", id) if !id.is_empty() => ChatCommand::Select(id.to_string()),
            ("delete" | "rm", id) if !id.is_empty() => ChatCommand::Delete(id.to_string()),
            ("help" | "?", _) => ChatCommand::Help,
            ("exit" | "quit" | "q", _) => ChatCommand::Exit,
            _ => ChatCommand::Unknown(line.to_string()),
        }
    }
}

fn print_help() {
    println!("{}", style("Commands:").bold());
    println!("  /new            start a new conversation");
    println!("  /list           list conversations");
    println!("  /select <id>    switch to a conversation");
    println!("  /delete <id>    delete a conversation");
    println!("  /help           show this help");
    println!("  /exit           quit");
    println!("Anything else is sent to the active conversation.");
}

pub fn print_session_list(store: &SessionStore) {
    let summaries = store.summaries();
    if summaries.is_empty() {
        println!("No conversations yet.");
        return;
    }

    let active = store.active_id();
    for summary in summaries {
        let marker = if active.as_ref() == Some(&summary.id) {
            style("*").green().to_string()
        } else {
            " ".to_string()
        };
        println!(
            "{} {}  {}  {}",
            marker,
            style(summary.id.as_str()).dim(),
            summary.title,
            style(format!(
                "({} messages, {})",
                summary.message_count,
                summary.updated_at.format("%Y-%m-%d %H:%M")
            ))
            .dim()
        );
    }
}

pub fn print_transcript(session: &Session) {
    println!("{}", style(session.display_title()).bold().cyan());
    for message in &session.messages {
        let who = if message.is_user {
            style("you").green().bold()
        } else {
            style("atlas").cyan().bold()
        };
        println!("{} {}", who, message.content);
    }
}

/// Send `text` and wait for the assistant reply, returning it
pub async fn send_and_wait(
    store: &SessionStore,
    session: Option<&SessionId>,
    text: &str,
) -> Result<String> {
    let pending = store.send_message(session, text)?;
    let session_id = pending.session_id().clone();
    pending.settled().await;

    store
        .session(&session_id)
        .and_then(|s| s.messages.last().filter(|m| !m.is_user).cloned())
        .map(|m| m.content)
        .ok_or_else(|| anyhow::anyhow!("No reply recorded for session {}", session_id))
}

/// Run the read-eval loop until `/exit` or end of input
pub async fn run_chat_loop(store: SessionStore) -> Result<()> {
    println!("{}", style("Planet Atlas").bold().cyan());
    println!("Ask anything about the world. Type /help for commands.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let prompt = match store.active_session() {
            Some(session) => session.display_title(),
            None => "new".to_string(),
        };
        print!("{} ", style(format!("[{}]>", prompt)).dim());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match ChatCommand::parse(&line) {
            ChatCommand::Empty => {}
            ChatCommand::Help => print_help(),
            ChatCommand::Exit => break,
            ChatCommand::New => {
                let id = store.create_session();
                println!("Started conversation {}", style(id.as_str()).dim());
            }
            ChatCommand::List => print_session_list(&store),
            ChatCommand::Select(id) => {
                let id = SessionId::from(id);
                match store.select_session(Some(&id)) {
                    Ok(()) => {
                        if let Some(session) = store.session(&id) {
                            print_transcript(&session);
                        }
                    }
                    Err(e) => println!("{} {}", style("!").red(), e),
                }
            }
            ChatCommand::Delete(id) => {
                if store.delete_session(&SessionId::from(id.as_str())) {
                    println!("Deleted {}", id);
                } else {
                    println!("{} No conversation {}", style("!").red(), id);
                }
            }
            ChatCommand::Send(text) => {
                let active = store.active_id();
                match send_and_wait(&store, active.as_ref(), &text).await {
                    Ok(reply) => println!("{} {}\n", style("atlas").cyan().bold(), reply),
                    Err(e) => match e.downcast_ref::<Error>() {
                        Some(Error::ReplyPending(_)) => {
                            println!("{} Still waiting for the previous reply", style("!").yellow())
                        }
                        _ => println!("{} {}", style("!").red(), e),
                    },
                }
            }
            ChatCommand::Unknown(line) => {
                debug!("Unknown chat command {:?}", line);
                println!("Unknown command {}. Type /help.", line);
            }
        }
    }

    Ok(())
}
