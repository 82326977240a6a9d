//! CLI entry point for Planet Atlas

mod chat;

use anyhow::{Context, Result};
use atlas_core::config::{Config, ConfigLoader, ReplyMode};
use atlas_core::logging::init_logging;
use atlas_core::session::{FileKeyValueStore, SessionId, SessionStore, SlotPersistence};
use atlas_core::utils::expand_home;
use atlas_providers::build_reply_source;
use atlas_server::{run_server, AppState};
use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::chat::{print_session_list, print_transcript, run_chat_loop, send_and_wait};

#[derive(Parser)]
#[command(name = "planet-atlas")]
#[command(about = "Chat with a geography assistant from the terminal")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration directory
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing configuration
        #[arg(short, long)]
        force: bool,
    },
    /// Start an interactive chat
    Chat {
        /// Use canned offline replies
        #[arg(long)]
        demo: bool,
    },
    /// Send one message and print the reply
    Ask {
        /// Message to send
        #[arg(short, long)]
        message: String,
        /// Session to continue; a new one is created when omitted
        #[arg(short, long)]
        session: Option<String>,
        /// Use canned offline replies
        #[arg(long)]
        demo: bool,
    },
    /// Inspect stored conversations
    Sessions {
        #[command(subcommand)]
        command: SessionCommands,
        /// Use the demo storage slot
        #[arg(long, global = true)]
        demo: bool,
    },
    /// Run the chat backend
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[derive(Subcommand)]
enum SessionCommands {
    /// List conversations
    List,
    /// Print a conversation
    Show {
        id: String,
        /// Print the stored JSON instead of a transcript
        #[arg(long)]
        json: bool,
    },
    /// Delete a conversation
    Delete { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_loader = if let Some(dir) = cli.config_dir {
        ConfigLoader::with_dir(dir)
    } else {
        ConfigLoader::new()
    };

    if let Commands::Init { force } = cli.command {
        return run_init(&config_loader, force);
    }

    let config = load_config(&config_loader, &cli.command)?;
    let _log_guard = init_logging(&config.logging);

    match cli.command {
        Commands::Init { .. } => {}
        Commands::Chat { .. } => {
            debug!("Starting interactive chat");
            run_chat_loop(open_store(&config)).await?;
        }
        Commands::Ask {
            message, session, ..
        } => run_ask(&config, &message, session).await?,
        Commands::Sessions { command, .. } => run_sessions(&config, command)?,
        Commands::Serve { .. } => run_serve(&config).await?,
    }

    Ok(())
}

impl Commands {
    /// Fold command-line choices into the loaded configuration
    fn apply_to(&self, config: &mut Config) {
        match self {
            Commands::Chat { demo: true }
            | Commands::Ask { demo: true, .. }
            | Commands::Sessions { demo: true, .. } => config.reply.mode = ReplyMode::Simulated,
            Commands::Serve { port: Some(port) } => config.server.port = *port,
            _ => {}
        }
    }
}

/// Load the configuration with the command's overrides applied before
/// validation, so `--demo` works without a usable remote endpoint.
fn load_config(loader: &ConfigLoader, command: &Commands) -> Result<Config> {
    loader
        .load_with(|config| command.apply_to(config))
        .with_context(|| format!("Failed to load {}", loader.config_path().display()))
}

/// Build a session store over the configured storage slot
fn open_store(config: &Config) -> SessionStore {
    let kv = FileKeyValueStore::new(expand_home(&config.storage.dir));
    let persistence = SlotPersistence::new(Arc::new(kv), config.storage_key());
    SessionStore::open(Arc::new(persistence), build_reply_source(&config.reply))
}

fn run_init(loader: &ConfigLoader, force: bool) -> Result<()> {
    let path = loader.config_path();
    if path.exists() && !force {
        println!(
            "Configuration already exists at {} (use --force to overwrite)",
            path.display()
        );
        return Ok(());
    }

    loader.save(&Config::default())?;
    println!("{} Wrote {}", style("✓").green(), path.display());
    println!("Run `planet-atlas chat --demo` to try it without a backend.");
    Ok(())
}

async fn run_ask(config: &Config, message: &str, session: Option<String>) -> Result<()> {
    let store = open_store(config);
    let session = session.map(SessionId::from);

    let reply = send_and_wait(&store, session.as_ref(), message).await?;
    println!("{}", reply);
    if session.is_none() {
        if let Some(id) = store.active_id() {
            eprintln!("{}", style(format!("session: {}", id)).dim());
        }
    }
    Ok(())
}

fn run_sessions(config: &Config, command: SessionCommands) -> Result<()> {
    let store = open_store(config);

    match command {
        SessionCommands::List => print_session_list(&store),
        SessionCommands::Show { id, json } => {
            let session = store
                .session(&SessionId::from(id.as_str()))
                .ok_or_else(|| anyhow::anyhow!("No conversation {}", id))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&session)?);
            } else {
                print_transcript(&session);
            }
        }
        SessionCommands::Delete { id } => {
            if !store.delete_session(&SessionId::from(id.as_str())) {
                anyhow::bail!("No conversation {}", id);
            }
            println!("Deleted {}", id);
        }
    }
    Ok(())
}

async fn run_serve(config: &Config) -> Result<()> {
    let state = AppState::from_config(&config.upstream);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received");
            let _ = shutdown_tx.send(());
        }
    });

    info!(
        "Serving chat backend with model {} via {}",
        config.upstream.model, config.upstream.api_base
    );
    run_server(state, &config.server, shutdown_rx).await
}
