use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands {
    pub mod ask;
    pub mod auth;
    pub mod chat;
}
mod output;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start an interactive conversation
    Chat {
        /// Speak the answers instead of streaming them as text
        #[arg(short, long)]
        speech: bool,
    },

    /// Answer a single question and exit
    Ask {
        /// The question to ask
        #[arg(required_unless_present = "audio", conflicts_with = "audio")]
        prompt: Option<String>,

        /// Transcribe the question from a wav recording
        #[arg(short, long, value_name = "FILE")]
        audio: Option<PathBuf>,

        /// Speak the answer instead of printing it as it streams
        #[arg(short, long)]
        speech: bool,
    },

    /// Authorize access to the configured Google calendar
    Auth,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Chat { speech } => commands::chat::execute(speech).await,
        Command::Ask {
            prompt,
            audio,
            speech,
        } => commands::ask::execute(prompt, audio, speech).await,
        Command::Auth => commands::auth::execute().await,
    }
}
