use clap::Args;

use crate::constants;
use crate::error::ConfigError;

/// Provider settings shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct ProviderArgs {
    #[arg(long, global = true, env = "GROQ_API_KEY", hide_env_values = true, help = "API key for the completion provider.")]
    pub api_key: Option<String>,
    #[arg(long, global = true, help = "Chat completions endpoint URL. Defaults to $GROQ_API_URL or the Groq endpoint.")]
    pub api_url: Option<String>,
    #[arg(long, global = true, help = "Model name. Defaults to $GROQ_CHAT_MODEL or deepseek-r1-distill-llama-70b.")]
    pub model: Option<String>,
    #[arg(long, global = true, default_value_t = constants::DEFAULT_TEMPERATURE, help = "Sampling temperature.")]
    pub temperature: f32,
    #[arg(long, global = true, default_value_t = constants::DEFAULT_MAX_TOKENS, help = "Maximum tokens per reply.")]
    pub max_tokens: u32,
    #[arg(long, global = true, default_value_t = constants::DEFAULT_TOP_P, help = "Nucleus sampling cutoff.")]
    pub top_p: f32,
}

/// Validated provider configuration.
#[derive(Clone, PartialEq)]
pub struct Config {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
}

// Hand-written so the key never ends up in logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("top_p", &self.top_p)
            .finish()
    }
}

impl ProviderArgs {
    pub fn into_config(self) -> Result<Config, ConfigError> {
        let api_key = self
            .api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingApiKey {
                var: constants::API_KEY_VAR,
            })?;

        let config = Config {
            api_key,
            api_url: self.api_url.unwrap_or_else(|| constants::GROQ_API_URL.clone()),
            model: self.model.unwrap_or_else(|| constants::CHAT_MODEL.clone()),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
        };
        config.validate()?;
        Ok(config)
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey {
                var: constants::API_KEY_VAR,
            });
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidValue {
                name: "temperature",
                reason: format!("{} is outside 0.0..=2.0", self.temperature),
            });
        }
        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return Err(ConfigError::InvalidValue {
                name: "top_p",
                reason: format!("{} is outside (0.0, 1.0]", self.top_p),
            });
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::InvalidValue {
                name: "max_tokens",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "model",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
