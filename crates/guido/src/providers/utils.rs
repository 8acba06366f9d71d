use anyhow::{anyhow, Result};
use serde_json::{json, Value};
use tracing::warn;

use super::base::Usage;

use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall};

/// Convert the transcript into input items for the responses api
///
/// Text becomes a role/content item, each tool request a `function_call` item and
/// each tool result a `function_call_output` item carrying the same call id.
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    let mut items = Vec::new();

    for message in messages {
        for content in &message.content {
            match content {
                MessageContent::Text(text) => {
                    if text.text.is_empty() {
                        continue;
                    }
                    let role = match message.role {
                        Role::System => "system",
                        Role::User => "user",
                        Role::Assistant => "assistant",
                        // text in a tool message is shown to the model as user input
                        Role::Tool => "user",
                    };
                    items.push(json!({
                        "role": role,
                        "content": text.text,
                    }));
                }
                MessageContent::ToolRequest(request) => {
                    let arguments = match &request.tool_call.arguments {
                        Value::String(raw) => raw.clone(),
                        other => other.to_string(),
                    };
                    items.push(json!({
                        "type": "function_call",
                        "call_id": request.id,
                        "name": request.tool_call.name,
                        "arguments": arguments,
                    }));
                }
                MessageContent::ToolResponse(response) => {
                    items.push(json!({
                        "type": "function_call_output",
                        "call_id": response.id,
                        "output": response.output,
                    }));
                }
            }
        }
    }

    items
}

/// Convert tool declarations to the responses api function tool specification
pub fn tools_to_openai_spec(tools: &[Tool]) -> Result<Vec<Value>> {
    let mut tool_names = std::collections::HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name));
        }

        result.push(json!({
            "type": "function",
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
            "strict": true,
        }));
    }

    Ok(result)
}

/// Convert a responses api response object to an assistant message
pub fn openai_response_to_message(response: &Value) -> Result<Message> {
    let output = response
        .get("output")
        .and_then(|o| o.as_array())
        .ok_or_else(|| anyhow!("No output in response: {}", response))?;

    let mut message = Message::assistant();

    for item in output {
        match item.get("type").and_then(|t| t.as_str()) {
            Some("message") => {
                let parts = item
                    .get("content")
                    .and_then(|c| c.as_array())
                    .into_iter()
                    .flatten();
                for part in parts {
                    if part.get("type").and_then(|t| t.as_str()) == Some("output_text") {
                        if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
                            message = message.with_text(text);
                        }
                    }
                }
            }
            Some("function_call") => {
                let id = item["call_id"].as_str().unwrap_or_default().to_string();
                let name = item["name"].as_str().unwrap_or_default().to_string();
                let raw = item["arguments"].as_str().unwrap_or_default();
                let arguments = match serde_json::from_str::<Value>(raw) {
                    Ok(arguments) => arguments,
                    Err(e) => {
                        warn!(call_id = %id, error = %e, "tool arguments are not valid json");
                        Value::String(raw.to_string())
                    }
                };
                message = message.with_tool_request(id, ToolCall::new(name, arguments));
            }
            // reasoning and hosted tool items carry nothing the transcript needs
            _ => {}
        }
    }

    Ok(message)
}

/// Concatenated text of every output message, like the sdk's `output_text`
pub fn output_text(response: &Value) -> Result<String> {
    Ok(openai_response_to_message(response)?.text())
}

pub fn get_usage(data: &Value) -> Usage {
    let usage = match data.get("usage") {
        Some(usage) => usage,
        None => return Usage::default(),
    };

    let input_tokens = usage
        .get("input_tokens")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32);

    let output_tokens = usage
        .get("output_tokens")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32);

    let total_tokens = usage
        .get("total_tokens")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32)
        .or_else(|| match (input_tokens, output_tokens) {
            (Some(input), Some(output)) => Some(input + output),
            _ => None,
        });

    Usage::new(input_tokens, output_tokens, total_tokens)
}


#[derive(Debug, thiserror::Error)]
#[error("Context length exceeded. Message: {0}")]
pub struct ContextLengthExceededError(String);

pub fn check_openai_context_length_error(error: &Value) -> Option<ContextLengthExceededError> {
    let code = error.get("code")?.as_str()?;
    if code == "context_length_exceeded" || code == "string_above_max_length" {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error")
            .to_string();
        Some(ContextLengthExceededError(message))
    } else {
        None
    }
}
