use anyhow::{anyhow, Context, Result};
use base64::Engine;
use cliclack::spinner;
use console::style;
use futures::StreamExt;
use std::io::{self, Write};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use guido::agent::{Agent, EXHAUSTED_APOLOGY};
use guido::errors::ReplyError;
use guido::mode::Mode;
use guido::models::event::StreamEvent;
use guido::transcript::Transcript;

/// Stream one reply to the terminal. Ctrl-C cancels the reply at the next turn.
pub async fn render_reply(
    agent: &Agent,
    transcript: &mut Transcript,
    query: String,
    mode: Mode,
    player: &str,
) -> Result<()> {
    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let spin = spinner();
    spin.start("awaiting reply");
    let mut spinning = true;

    let mut stream = agent.reply_stream(transcript, query, mode, cancel);
    let mut result = Ok(());
    while let Some(event) = stream.next().await {
        if spinning {
            spin.stop("");
            spinning = false;
        }
        match event {
            Ok(StreamEvent::TextFragment { text }) => {
                print!("{}", text);
                io::stdout().flush()?;
            }
            Ok(StreamEvent::ToolCallNotice { tool_name }) => {
                println!("{}", style(format!("[using {}]", tool_name)).dim());
            }
            Ok(StreamEvent::AudioFragment { data, mime_type }) => {
                println!();
                if let Err(e) = play_audio(player, &data, &mime_type).await {
                    tracing::warn!("Could not play the answer: {}", e);
                }
            }
            Err(ReplyError::TurnBudgetExhausted { max_turns }) => {
                tracing::info!("Reply ran out of turns after {}", max_turns);
                print!("{}", EXHAUSTED_APOLOGY);
            }
            Err(ReplyError::Cancelled) => {
                println!("{}", style("Cancelled").yellow());
            }
            Err(e) => result = Err(e.into()),
        }
    }
    if spinning {
        spin.stop("");
    }
    interrupt.abort();
    println!();
    result
}

/// Decode base64 audio into a temporary file and hand it to the player command
pub async fn play_audio(player: &str, data: &str, mime_type: &str) -> Result<()> {
    let file = write_audio(data, mime_type)?;
    let status = Command::new(player)
        .arg(file.path())
        .status()
        .await
        .with_context(|| format!("Failed to start audio player `{}`", player))?;
    if !status.success() {
        return Err(anyhow!("Audio player `{}` exited with {}", player, status));
    }
    Ok(())
}

fn write_audio(data: &str, mime_type: &str) -> Result<tempfile::NamedTempFile> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(data)?;
    let suffix = match mime_type {
        "audio/wav" | "audio/x-wav" => ".wav",
        _ => ".mp3",
    };
    let mut file = tempfile::Builder::new()
        .prefix("guido-")
        .suffix(suffix)
        .tempfile()?;
    file.write_all(&bytes)?;
    file.flush()?;
    Ok(file)
}
