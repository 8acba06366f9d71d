use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

use guido::configuration::Settings;
use guido::factory::{build_agent, speech};
use guido::mode::Mode;
use guido::speech::Transcriber;
use guido::transcript::Transcript;

use crate::output::render_reply;

pub async fn execute(prompt: Option<String>, audio: Option<PathBuf>, speak: bool) -> Result<()> {
    let settings = Settings::new()?;

    let query = match (prompt, audio) {
        (Some(prompt), _) => prompt,
        (None, Some(path)) => {
            let wav = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let text = speech(&settings)?.transcribe(wav).await?;
            tracing::info!("Transcribed question: {}", text);
            text
        }
        (None, None) => return Err(anyhow!("Nothing to ask")),
    };
    if query.trim().is_empty() {
        return Err(anyhow!("The question is empty"));
    }

    let agent = build_agent(&settings)?;
    let mode = if speak { Mode::Speech } else { Mode::Text };
    let mut transcript = Transcript::with_mode(mode)?;

    render_reply(&agent, &mut transcript, query, mode, &settings.speech.player).await
}
