use std::env;
use std::fmt;

/// Telegram bot token variable.
pub const TELEGRAM_TOKEN_VAR: &str = "TELEGRAM_BOT_TOKEN";
/// OpenAI API key variable.
pub const OPENAI_KEY_VAR: &str = "OPENAI_API_KEY";

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// A required environment variable is unset or blank.
    MissingVar(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingVar(name) => {
                write!(f, "required environment variable {name} is not set")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// The two startup secrets. Everything else about the bot is fixed.
#[derive(Debug)]
pub struct Config {
    pub telegram_bot_token: String,
    pub openai_api_key: String,
}

impl Config {
    /// Read both secrets from the environment. No defaults, no retries:
    /// a missing variable aborts startup before any connection is opened.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            telegram_bot_token: require(TELEGRAM_TOKEN_VAR)?,
            openai_api_key: require(OPENAI_KEY_VAR)?,
        })
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(name)),
    }
}
