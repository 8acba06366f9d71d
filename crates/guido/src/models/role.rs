use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// The author of a message in the transcript
pub enum Role {
    System,
    User,
    Assistant,
    /// A tool result, answering an earlier assistant tool request
    Tool,
}
