//! Server-sent event parsing for streamed responses api calls.
//!
//! Converts the raw byte stream of a `reqwest::Response` into
//! [`ProviderEvent`]s, handling events and UTF-8 sequences split across chunks.

use anyhow::{anyhow, bail, Result};
use futures::stream::{BoxStream, StreamExt};
use serde_json::Value;

use super::base::ProviderEvent;
use super::utils::{get_usage, openai_response_to_message};

/// Maximum amount of undelivered data before we abort the stream.
const MAX_BUF: usize = 16 * 1024 * 1024;

/// Splits a byte stream into the `data` payloads of complete events
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    buffer: String,
}

impl SseDecoder {
    /// Feed raw bytes, returning the data payload of every event completed by them
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<String>> {
        if self.pending.len() + self.buffer.len() + bytes.len() > MAX_BUF {
            bail!("Response stream buffer exceeded 16 MiB");
        }
        self.pending.extend_from_slice(bytes);

        // keep an incomplete trailing UTF-8 sequence for the next chunk
        let mut valid = match std::str::from_utf8(&self.pending) {
            Ok(text) => text.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(e) => bail!("Invalid UTF-8 in response stream: {}", e),
        };
        // a trailing \r may be the first half of a \r\n split across chunks
        if self.pending[..valid].ends_with(b"\r") {
            valid -= 1;
        }
        let text = std::str::from_utf8(&self.pending[..valid])?;
        self.buffer.push_str(&text.replace("\r\n", "\n"));
        self.pending.drain(..valid);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..pos + 2).collect();
            let data = block
                .lines()
                .filter_map(|line| line.strip_prefix("data:"))
                .map(|data| data.strip_prefix(' ').unwrap_or(data))
                .collect::<Vec<_>>()
                .join("\n");
            if !data.is_empty() {
                payloads.push(data);
            }
        }
        Ok(payloads)
    }
}

/// Interpret the payload of one event. Events the agent does not care about map to `None`.
pub fn parse_event_data(data: &str) -> Result<Option<ProviderEvent>> {
    if data == "[DONE]" {
        return Ok(None);
    }

    let event: Value = serde_json::from_str(data)?;
    match event.get("type").and_then(|t| t.as_str()) {
        Some("response.output_text.delta") => {
            let delta = event["delta"].as_str().unwrap_or_default();
            Ok(Some(ProviderEvent::TextDelta(delta.to_string())))
        }
        Some("response.completed") => {
            let response = &event["response"];
            let message = openai_response_to_message(response)?;
            Ok(Some(ProviderEvent::Completed(message, get_usage(response))))
        }
        Some("response.failed") | Some("response.incomplete") => {
            let response = &event["response"];
            let reason = response
                .get("error")
                .filter(|e| !e.is_null())
                .or_else(|| response.get("incomplete_details"))
                .cloned()
                .unwrap_or(Value::Null);
            Err(anyhow!("Response did not complete: {}", reason))
        }
        Some("error") => Err(anyhow!(
            "OpenAI API error: {}",
            event
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error")
        )),
        _ => Ok(None),
    }
}

/// Convert a streamed responses api reply into provider events
///
/// The stream ends after the `Completed` event. A stream that closes before the
/// response completed ends with an error instead.
pub fn into_event_stream(response: reqwest::Response) -> BoxStream<'static, Result<ProviderEvent>> {
    let mut bytes = Box::pin(response.bytes_stream());

    Box::pin(async_stream::try_stream! {
        let mut decoder = SseDecoder::default();
        let mut completed = false;

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk?;
            for data in decoder.push(&chunk)? {
                if let Some(event) = parse_event_data(&data)? {
                    completed = matches!(event, ProviderEvent::Completed(..));
                    yield event;
                    if completed {
                        break;
                    }
                }
            }
            if completed {
                break;
            }
        }

        if !completed {
            Err::<(), _>(anyhow!("Response stream ended before the response completed"))?;
        }
    })
}
