use base64::Engine;
use serde::{Deserialize, Serialize};

/// Events emitted while streaming a reply, in the order they happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum StreamEvent {
    /// A piece of answer text. In speech mode this is the whole answer.
    TextFragment { text: String },
    /// A tool is about to be executed
    ToolCallNotice { tool_name: String },
    /// Synthesized speech, base64 encoded
    AudioFragment { data: String, mime_type: String },
}

impl StreamEvent {
    pub fn text<S: Into<String>>(text: S) -> Self {
        StreamEvent::TextFragment { text: text.into() }
    }

    pub fn tool_call<S: Into<String>>(tool_name: S) -> Self {
        StreamEvent::ToolCallNotice {
            tool_name: tool_name.into(),
        }
    }

    pub fn audio<S: Into<String>>(bytes: &[u8], mime_type: S) -> Self {
        StreamEvent::AudioFragment {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            mime_type: mime_type.into(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            StreamEvent::TextFragment { text } => Some(text),
            _ => None,
        }
    }
}
