use anyhow::{bail, Result};
use cliclack::password;

pub const SCRAPYBARA_API_KEY: &str = "SCRAPYBARA_API_KEY";
pub const ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";

/// Read the secret `env_name` from the environment, asking the user for it when it is unset.
///
/// The answer is masked while typed. An empty answer is an error. The answer is exported so
/// later lookups see it.
pub fn get_env_value_or_input(env_name: &str, input_prompt: &str) -> Result<String> {
    if let Ok(value) = std::env::var(env_name) {
        if !value.trim().is_empty() {
            return Ok(value);
        }
    }

    let input_value: String = password(input_prompt).mask('▪').interact()?;

    let value = require_value(env_name, &input_value)?;
    std::env::set_var(env_name, &value);
    Ok(value)
}

fn require_value(env_name: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        bail!("{} is required", env_name);
    }
    Ok(value.to_string())
}

pub struct Credentials {
    pub scrapybara_api_key: String,
    pub anthropic_api_key: String,
}

impl Credentials {
    /// Both keys must be known before any instance is leased
    pub fn load() -> Result<Self> {
        Ok(Self {
            scrapybara_api_key: get_env_value_or_input(
                SCRAPYBARA_API_KEY,
                "Please enter your Scrapybara API key:",
            )?,
            anthropic_api_key: get_env_value_or_input(
                ANTHROPIC_API_KEY,
                "Please enter your Anthropic API key:",
            )?,
        })
    }
}
