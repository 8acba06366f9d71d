use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::prompt_template::load_prompt_file;

/// How answers are delivered for the current session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Text,
    Speech,
}

impl Mode {
    /// Render the system instruction for this mode. Speech mode adds the
    /// spoken-language constraints on top of the base instruction.
    pub fn system_prompt(&self, now: DateTime<Utc>) -> Result<String, tera::Error> {
        let mut context = HashMap::new();
        context.insert("current_time", now.format("%Y-%m-%dT%H:%M:%SZ").to_string());
        context.insert("weekday", now.format("%A").to_string());

        let mut prompt = load_prompt_file("system.md", &context)?;
        if *self == Mode::Speech {
            prompt.push_str(&load_prompt_file("speech.md", &context)?);
        }
        Ok(prompt)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Text => write!(f, "text"),
            Mode::Speech => write!(f, "speech"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Mode::Text),
            "speech" | "voice" => Ok(Mode::Speech),
            other => Err(format!("Unknown mode: {}", other)),
        }
    }
}
