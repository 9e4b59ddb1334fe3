//! # strand
//!
//! Command-line client: stream one chat turn into a timeline, or watch a
//! conversation's side channel.

#![deny(unsafe_code)]

mod render;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use strand_client::{ConnectionManager, TurnOrchestrator};
use strand_events::HistoryMessage;
use strand_settings::{StrandSettings, load_settings, load_settings_from_path};
use tracing::info;

/// Streaming timeline client.
#[derive(Parser, Debug)]
#[command(name = "strand", about = "Streaming timeline client", version)]
struct Cli {
    /// Settings file (defaults to `~/.strand/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send one message and print the resulting timeline.
    Chat {
        /// Conversation to send into.
        #[arg(long, short)]
        conversation: String,

        /// History file (JSON array) to rebuild the timeline from first.
        #[arg(long)]
        history: Option<PathBuf>,

        /// Print the timeline as JSON instead of a transcript.
        #[arg(long)]
        json: bool,

        /// Message text.
        message: String,
    },

    /// Connect to the side channel and print inbound envelopes.
    Watch {
        /// Conversation to join.
        #[arg(long, short)]
        conversation: String,

        /// Join as this operator instead of the configured user.
        #[arg(long)]
        agent: Option<String>,

        /// Stop after this many seconds (default: until Ctrl-C).
        #[arg(long)]
        seconds: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.settings {
        Some(path) => load_settings_from_path(path),
        None => load_settings(),
    }
    .context("failed to load settings")?;

    if cli.json_logs || settings.logging.json {
        strand_core::logging::init_json_subscriber(&settings.logging.level);
    } else {
        strand_core::logging::init_subscriber(&settings.logging.level);
    }

    match cli.command {
        Command::Chat {
            conversation,
            history,
            json,
            message,
        } => chat(&settings, &conversation, history.as_deref(), json, &message).await,
        Command::Watch {
            conversation,
            agent,
            seconds,
        } => watch(&settings, &conversation, agent.as_deref(), seconds).await,
    }
}

async fn chat(
    settings: &StrandSettings,
    conversation: &str,
    history: Option<&Path>,
    json: bool,
    message: &str,
) -> Result<()> {
    let orchestrator = TurnOrchestrator::from_settings(settings, conversation);

    if let Some(path) = history {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read history: {}", path.display()))?;
        let messages: Vec<HistoryMessage> = serde_json::from_str(&raw)
            .with_context(|| format!("invalid history file: {}", path.display()))?;
        orchestrator.hydrate(&messages);
        info!(messages = messages.len(), "timeline hydrated from history");
    }

    tokio::select! {
        result = orchestrator.send_message(message, Vec::new()) => {
            result.context("turn failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, aborting turn");
        }
    }

    let state = orchestrator.snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        print!("{}", render::transcript(&state));
    }
    Ok(())
}

async fn watch(
    settings: &StrandSettings,
    conversation: &str,
    agent: Option<&str>,
    seconds: Option<u64>,
) -> Result<()> {
    let base = settings
        .ws_base_url()
        .context("no usable side-channel base URL")?;
    let manager = match agent {
        Some(agent_id) => {
            ConnectionManager::for_agent(&base, conversation, agent_id, &settings.websocket)
        }
        None => ConnectionManager::for_user(
            &base,
            conversation,
            &settings.identity.user_id,
            &settings.websocket,
        ),
    }
    .context("invalid side-channel endpoint")?;

    let _messages = manager.on_message(|message| println!("{}", message.encode()));
    let _states = manager.on_state_change(|next, prev| info!(from = %prev, to = %next, "state"));
    let _errors = manager.on_error(|error| eprintln!("side channel: {error}"));
    manager.connect();

    match seconds {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => {
            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for Ctrl-C")?;
        }
    }

    manager.destroy();
    Ok(())
}
