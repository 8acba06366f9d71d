use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

use super::base::{Provider, ProviderEvent, Usage};
use super::configs::OpenAiProviderConfig;
use super::sse::into_event_stream;
use super::utils::{
    check_openai_context_length_error, get_usage, messages_to_openai_spec,
    openai_response_to_message, output_text, tools_to_openai_spec,
};
use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::web_search::WebSearch;

/// Completion service backed by the OpenAI responses api
#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OpenAiProviderConfig {
        &self.config
    }

    fn build_payload(&self, messages: &[Message], tools: &[Tool], stream: bool) -> Result<Value> {
        let mut payload = json!({
            "model": self.config.model,
            "input": messages_to_openai_spec(messages),
            "stream": stream,
        });
        let object = payload
            .as_object_mut()
            .ok_or_else(|| anyhow!("payload is not an object"))?;

        if !tools.is_empty() {
            object.insert("tools".to_string(), json!(tools_to_openai_spec(tools)?));
        }
        if let Some(temp) = self.config.temperature {
            object.insert("temperature".to_string(), json!(temp));
        }
        if let Some(tokens) = self.config.max_output_tokens {
            object.insert("max_output_tokens".to_string(), json!(tokens));
        }

        Ok(payload)
    }

    async fn post(&self, payload: &Value) -> Result<Response> {
        let url = format!("{}/v1/responses", self.config.host.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(anyhow!("Server error: {}", status))
            }
            status => {
                let body: Value = response.json().await.unwrap_or(Value::Null);
                if let Some(error) = body.get("error") {
                    if let Some(err) = check_openai_context_length_error(error) {
                        return Err(err.into());
                    }
                    return Err(anyhow!("OpenAI API error ({}): {}", status, error));
                }
                Err(anyhow!("Request failed: {}", status))
            }
        }
    }

    async fn post_json(&self, payload: &Value) -> Result<Value> {
        let response: Value = self.post(payload).await?.json().await?;
        if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
            return Err(anyhow!("OpenAI API error: {}", error));
        }
        Ok(response)
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn complete(&self, messages: &[Message], tools: &[Tool]) -> Result<(Message, Usage)> {
        let payload = self.build_payload(messages, tools, false)?;
        let response = self.post_json(&payload).await?;

        let message = openai_response_to_message(&response)?;
        let usage = get_usage(&response);

        Ok((message, usage))
    }

    async fn stream(
        &self,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<BoxStream<'static, Result<ProviderEvent>>> {
        let payload = self.build_payload(messages, tools, true)?;
        let response = self.post(&payload).await?;
        Ok(into_event_stream(response))
    }
}

#[async_trait]
impl WebSearch for OpenAiProvider {
    async fn search(&self, query: &str) -> Result<String> {
        let payload = json!({
            "model": self.config.model,
            "input": query,
            "tools": [{"type": "web_search"}],
        });
        let response = self.post_json(&payload).await?;
        output_text(&response)
    }
}
