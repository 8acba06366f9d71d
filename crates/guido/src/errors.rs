use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transcript::TranscriptError;

/// Failures raised by tools. These never leave the tool registry: they are
/// rendered into text the model can read and react to.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum AgentError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Tool execution failed: {0}")]
    ExecutionError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AgentResult<T> = Result<T, AgentError>;

/// Failures that end a reply. Tool failures are not among them.
#[derive(Error, Debug)]
pub enum ReplyError {
    #[error("No final answer was produced within {max_turns} turns")]
    TurnBudgetExhausted { max_turns: usize },

    #[error("Completion service failed: {0}")]
    Provider(#[from] anyhow::Error),

    #[error("Transcript rejected a message: {0}")]
    Transcript(#[from] TranscriptError),

    #[error("Failed to render the system prompt: {0}")]
    Prompt(#[from] tera::Error),

    #[error("Reply was cancelled")]
    Cancelled,
}
