use config::{Config, Environment};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

use crate::agent::DEFAULT_MAX_TURNS;
use crate::providers::configs::{OpenAiProviderConfig, OPENAI_HOST, OPENAI_MODEL};
use crate::speech::DEFAULT_VOICE;

pub const ENV_PREFIX: &str = "GUIDO";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// The environment variable that sets a dotted config key, `openai.api_key` -> `GUIDO_OPENAI__API_KEY`
pub fn to_env_var(field_path: &str) -> String {
    format!(
        "{}_{}",
        ENV_PREFIX,
        field_path.replace('.', "__").to_uppercase()
    )
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiSettings {
    pub api_key: String,
    #[serde(default = "default_openai_host")]
    pub host: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_output_tokens: Option<i32>,
}

impl OpenAiSettings {
    pub fn into_config(self) -> OpenAiProviderConfig {
        OpenAiProviderConfig {
            host: self.host,
            api_key: self.api_key,
            model: self.model,
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CalendarSettings {
    /// The calendar to manage, usually the account's email address
    #[serde(default)]
    pub id: Option<String>,
    /// The OAuth client json from the Google cloud console
    #[serde(default)]
    pub credentials_json: Option<String>,
    #[serde(default)]
    pub token_path: Option<PathBuf>,
}

impl CalendarSettings {
    /// Calendar id and client credentials, when the calendar is configured
    pub fn account(&self) -> Result<Option<(&str, &str)>, ConfigError> {
        match (self.id.as_deref(), self.credentials_json.as_deref()) {
            (Some(id), Some(credentials)) => Ok(Some((id, credentials))),
            (None, None) => Ok(None),
            (Some(_), None) => Err(ConfigError::MissingEnvVar {
                env_var: to_env_var("calendar.credentials_json"),
            }),
            (None, Some(_)) => Err(ConfigError::MissingEnvVar {
                env_var: to_env_var("calendar.id"),
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpeechSettings {
    #[serde(default = "default_voice")]
    pub voice: String,
    /// Command that plays an mp3 file given as its only argument
    #[serde(default = "default_player")]
    pub player: String,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            voice: default_voice(),
            player: default_player(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("server address: {}", e)))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub openai: OpenAiSettings,
    #[serde(default)]
    pub agent: AgentSettings,
    #[serde(default)]
    pub calendar: CalendarSettings,
    #[serde(default)]
    pub speech: SpeechSettings,
    #[serde(default)]
    pub server: ServerSettings,
}

impl Settings {
    /// Load `.env` if present, then read the environment
    pub fn new() -> Result<Self, ConfigError> {
        let _ = dotenv::dotenv();
        Self::from_env()
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("openai.host", default_openai_host())?
            .set_default("openai.model", default_model())?
            .set_default("agent.max_turns", default_max_turns() as i64)?
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port() as i64)?
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Self = match config.try_deserialize() {
            Ok(settings) => settings,
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);
                return Err(missing_field(err));
            }
        };

        if settings.openai.api_key.trim().is_empty() {
            return Err(ConfigError::MissingEnvVar {
                env_var: to_env_var("openai.api_key"),
            });
        }
        // a half configured calendar fails at startup, not on the first request
        settings.calendar.account()?;
        Ok(settings)
    }
}

/// Turn "missing field" errors into the variable the user has to set
fn missing_field(err: config::ConfigError) -> ConfigError {
    let error_str = err.to_string();
    if let Some(rest) = error_str.strip_prefix("missing field `") {
        let field = rest.split('`').next().unwrap_or_default();
        let path = match field {
            "api_key" => "openai.api_key",
            "openai" => "openai.api_key",
            other => other,
        };
        return ConfigError::MissingEnvVar {
            env_var: to_env_var(path),
        };
    }
    if let config::ConfigError::NotFound(field) = &err {
        return ConfigError::MissingEnvVar {
            env_var: to_env_var(field),
        };
    }
    ConfigError::Other(err)
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_openai_host() -> String {
    OPENAI_HOST.to_string()
}

fn default_model() -> String {
    OPENAI_MODEL.to_string()
}

fn default_max_turns() -> usize {
    DEFAULT_MAX_TURNS
}

fn default_voice() -> String {
    DEFAULT_VOICE.to_string()
}

fn default_player() -> String {
    "afplay".to_string()
}
