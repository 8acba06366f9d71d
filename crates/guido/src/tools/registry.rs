use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::errors::{AgentError, AgentResult};
use crate::models::message::ToolRequest;
use crate::models::tool::Tool;

/// Returned, verbatim, when the model asks for a tool that is not registered
pub const UNKNOWN_TOOL_MESSAGE: &str =
    "The requested tool does not exist. Use one of the declared tools or answer the user directly.";

/// A capability the model can call
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// The declaration sent to the completion service
    fn declaration(&self) -> &Tool;

    /// Run the tool. Arguments are the raw payload produced by the model.
    async fn call(&self, arguments: Value) -> AgentResult<Value>;
}

/// Deserialize raw tool arguments into a typed struct.
///
/// Argument structs use `#[serde(deny_unknown_fields)]`, which makes this the strict
/// schema check: wrong types, missing fields and undeclared fields are all rejected.
pub fn parse_arguments<T: DeserializeOwned>(arguments: Value) -> AgentResult<T> {
    serde_json::from_value(arguments).map_err(|e| AgentError::InvalidParameters(e.to_string()))
}

/// The text the model sees when a tool could not do its job
pub fn failure_message(error: &AgentError) -> String {
    format!(
        "The tool call failed: {}. Try again with a different tool or different arguments, \
         or inform the user that the request could not be completed.",
        error
    )
}

/// Maps tool names to their handlers, in registration order
#[derive(Default)]
pub struct ToolRegistry {
    handlers: Vec<Box<dyn ToolHandler>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool. Names must be unique.
    pub fn register(&mut self, handler: Box<dyn ToolHandler>) -> AgentResult<()> {
        let name = handler.declaration().name.clone();
        if self.index.contains_key(&name) {
            return Err(AgentError::Internal(format!("Duplicate tool name: {}", name)));
        }
        self.index.insert(name, self.handlers.len());
        self.handlers.push(handler);
        Ok(())
    }

    /// Builder form of `register`
    pub fn with_tool(mut self, handler: Box<dyn ToolHandler>) -> AgentResult<Self> {
        self.register(handler)?;
        Ok(self)
    }

    pub fn declarations(&self) -> Vec<Tool> {
        self.handlers
            .iter()
            .map(|handler| handler.declaration().clone())
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn ToolHandler> {
        self.index.get(name).map(|&i| self.handlers[i].as_ref())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run a tool by name. Never fails: unknown tools, invalid arguments and
    /// collaborator failures all come back as text the model can act on.
    pub async fn dispatch(&self, name: &str, arguments: Value) -> String {
        let Some(handler) = self.get(name) else {
            warn!(tool = name, "model requested an unknown tool");
            return UNKNOWN_TOOL_MESSAGE.to_string();
        };

        match handler.call(arguments).await {
            Ok(result) => {
                debug!(tool = name, "tool call succeeded");
                result.to_string()
            }
            Err(error) => {
                warn!(tool = name, %error, "tool call failed");
                failure_message(&error)
            }
        }
    }

    pub async fn dispatch_request(&self, request: &ToolRequest) -> String {
        self.dispatch(&request.tool_call.name, request.tool_call.arguments.clone())
            .await
    }
}
