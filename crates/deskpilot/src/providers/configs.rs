pub const ANTHROPIC_HOST: &str = "https://api.anthropic.com";
pub const ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-20241022";
pub const COMPUTER_USE_BETA: &str = "computer-use-2024-10-22";
pub const DEFAULT_MAX_TOKENS: i32 = 4096;

#[derive(Debug, Clone)]
pub struct AnthropicProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
    /// Sent as the `anthropic-beta` header when non-empty
    pub betas: Vec<String>,
}

impl AnthropicProviderConfig {
    pub fn new<S: Into<String>>(api_key: S) -> Self {
        Self {
            host: ANTHROPIC_HOST.to_string(),
            api_key: api_key.into(),
            model: ANTHROPIC_MODEL.to_string(),
            temperature: None,
            max_tokens: Some(DEFAULT_MAX_TOKENS),
            betas: vec![COMPUTER_USE_BETA.to_string()],
        }
    }
}
