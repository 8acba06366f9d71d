use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::models::message::Message;
use crate::models::tool::Tool;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// Incremental output of a streamed completion
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    /// A piece of answer text, as soon as the service produced it
    TextDelta(String),
    /// The assembled response, always the last event of a stream
    Completed(Message, Usage),
}

/// Base trait for completion services
#[async_trait]
pub trait Provider: Send + Sync {
    /// Generate the next assistant message for the transcript
    async fn complete(&self, messages: &[Message], tools: &[Tool]) -> Result<(Message, Usage)>;

    /// Same as `complete`, delivered incrementally
    async fn stream(
        &self,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<BoxStream<'static, Result<ProviderEvent>>>;
}
