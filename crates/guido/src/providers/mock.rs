use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::providers::base::{Provider, ProviderEvent, Usage};

/// A mock provider that returns pre-configured responses for testing
#[derive(Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<VecDeque<Message>>>,
    fallback: Option<Message>,
    requests: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<Message>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            fallback: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A provider that answers every request with the same message
    pub fn repeating(response: Message) -> Self {
        Self {
            fallback: Some(response),
            ..Self::new(Vec::new())
        }
    }

    /// Every transcript the provider was asked to complete, oldest first
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }

    fn next_response(&self, messages: &[Message]) -> Message {
        self.requests.lock().unwrap().push(messages.to_vec());
        let mut responses = self.responses.lock().unwrap();
        responses
            .pop_front()
            .or_else(|| self.fallback.clone())
            // Return empty response if no more pre-configured responses
            .unwrap_or_else(|| Message::assistant().with_text(""))
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(&self, messages: &[Message], _tools: &[Tool]) -> Result<(Message, Usage)> {
        Ok((self.next_response(messages), Usage::default()))
    }

    async fn stream(
        &self,
        messages: &[Message],
        _tools: &[Tool],
    ) -> Result<BoxStream<'static, Result<ProviderEvent>>> {
        let response = self.next_response(messages);
        // deliver the text word by word, like a real service would
        let mut events: Vec<Result<ProviderEvent>> = response
            .text()
            .split_inclusive(' ')
            .map(|word| Ok(ProviderEvent::TextDelta(word.to_string())))
            .collect();
        events.push(Ok(ProviderEvent::Completed(response, Usage::default())));
        Ok(Box::pin(stream::iter(events)))
    }
}
