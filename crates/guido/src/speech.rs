//! Text to speech for spoken replies and speech to text for recorded questions.
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde_json::json;
use std::time::Duration;

use crate::providers::configs::OpenAiProviderConfig;

pub const SPEECH_MODEL: &str = "gpt-4o-mini-tts";
pub const TRANSCRIPTION_MODEL: &str = "whisper-1";
pub const DEFAULT_VOICE: &str = "cedar";
pub const MP3_MIME_TYPE: &str = "audio/mpeg";

/// Recordings shorter than this are rejected before transcription
pub const MIN_RECORDING_SECS: f64 = 1.0;

const WAV_HEADER_LEN: usize = 44;

#[derive(Debug, Clone, PartialEq)]
pub struct Audio {
    pub data: Vec<u8>,
    pub mime_type: String,
}

#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Audio>;
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a PCM wav recording
    async fn transcribe(&self, wav: Vec<u8>) -> Result<String>;
}

/// Length of a canonical PCM wav file, in seconds
pub fn wav_duration(wav: &[u8]) -> Result<f64> {
    if wav.len() < WAV_HEADER_LEN || &wav[0..4] != b"RIFF" || &wav[8..12] != b"WAVE" {
        return Err(anyhow!("Recording is not a wav file"));
    }
    let byte_rate = u32::from_le_bytes([wav[28], wav[29], wav[30], wav[31]]);
    if byte_rate == 0 {
        return Err(anyhow!("Recording has a zero byte rate"));
    }
    Ok((wav.len() - WAV_HEADER_LEN) as f64 / byte_rate as f64)
}

pub fn check_recording_length(wav: &[u8]) -> Result<()> {
    let secs = wav_duration(wav)?;
    if secs < MIN_RECORDING_SECS {
        return Err(anyhow!(
            "Audio too short. Please record for at least {} second.",
            MIN_RECORDING_SECS
        ));
    }
    Ok(())
}

/// Speech in both directions through the OpenAI audio endpoints
pub struct OpenAiSpeech {
    client: Client,
    host: String,
    api_key: String,
    voice: String,
}

impl OpenAiSpeech {
    pub fn new(config: &OpenAiProviderConfig) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(120)).build()?;
        Ok(Self {
            client,
            host: config.host.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            voice: DEFAULT_VOICE.to_string(),
        })
    }

    pub fn with_voice<S: Into<String>>(mut self, voice: S) -> Self {
        self.voice = voice.into();
        self
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(anyhow!("OpenAI audio request failed ({}): {}", status, body))
    }
}

#[async_trait]
impl Synthesizer for OpenAiSpeech {
    async fn synthesize(&self, text: &str) -> Result<Audio> {
        if text.trim().is_empty() {
            return Err(anyhow!("Nothing to synthesize"));
        }

        let response = self
            .client
            .post(format!("{}/v1/audio/speech", self.host))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": SPEECH_MODEL,
                "voice": self.voice,
                "input": text,
                "response_format": "mp3",
            }))
            .send()
            .await?;
        let data = Self::check(response).await?.bytes().await?;

        if data.is_empty() {
            return Err(anyhow!("Audio file was not generated properly"));
        }
        Ok(Audio {
            data: data.to_vec(),
            mime_type: MP3_MIME_TYPE.to_string(),
        })
    }
}

#[async_trait]
impl Transcriber for OpenAiSpeech {
    async fn transcribe(&self, wav: Vec<u8>) -> Result<String> {
        check_recording_length(&wav)?;

        let file = Part::bytes(wav)
            .file_name("recording.wav")
            .mime_str("audio/wav")?;
        let form = Form::new()
            .text("model", TRANSCRIPTION_MODEL)
            .text("response_format", "text")
            .part("file", file);

        let response = self
            .client
            .post(format!("{}/v1/audio/transcriptions", self.host))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;
        let text = Self::check(response).await?.text().await?;
        Ok(text.trim().to_string())
    }
}
