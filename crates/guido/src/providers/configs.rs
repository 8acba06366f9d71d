pub const OPENAI_HOST: &str = "https://api.openai.com";
pub const OPENAI_MODEL: &str = "gpt-4.1";

#[derive(Debug, Clone)]
pub struct OpenAiProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<i32>,
}

impl OpenAiProviderConfig {
    pub fn new<S: Into<String>>(api_key: S) -> Self {
        Self {
            host: OPENAI_HOST.to_string(),
            api_key: api_key.into(),
            model: OPENAI_MODEL.to_string(),
            temperature: None,
            max_output_tokens: None,
        }
    }
}
