use std::collections::HashSet;
use std::path::PathBuf;

use teloxide::types::{ChatId, UserId};

use crate::router::Destinations;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is unset or blank.
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    /// A variable is set but can't be parsed.
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
    /// Validation error.
    #[error("config validation error: {0}")]
    Validation(String),
}

pub struct Config {
    pub zadarma_api_key: String,
    pub zadarma_api_secret: String,
    pub telegram_token: String,
    pub sandbox: bool,
    /// Overrides the production/sandbox endpoint when set.
    pub zadarma_base_url: Option<String>,
    pub destinations: Destinations,
    /// Users allowed to press the buttons. Empty means everyone.
    pub allowed_users: HashSet<UserId>,
    /// Chat that receives WARN/ERROR log lines.
    pub log_chat_id: Option<ChatId>,
    /// Directory for state files (logs).
    pub data_dir: PathBuf,
}

impl Config {
    /// Load from the process environment, after reading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let zadarma_api_key = require("ZADARMA_API_KEY")?;
        let zadarma_api_secret = require("ZADARMA_API_SECRET")?;
        let telegram_token = require("TELEGRAM_TOKEN")?;

        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = telegram_token.split(':').collect();
        if token_parts.len() != 2
            || token_parts[0].parse::<u64>().is_err()
            || token_parts[1].is_empty()
        {
            return Err(ConfigError::Validation(
                "TELEGRAM_TOKEN appears invalid (expected format: 123456789:ABCdefGHI...)".into(),
            ));
        }

        let sandbox = match get("ZADARMA_SANDBOX") {
            None => false,
            Some(value) => parse_bool(&value).ok_or(ConfigError::Invalid {
                name: "ZADARMA_SANDBOX",
                value,
            })?,
        };

        let defaults = Destinations::default();
        let destinations = Destinations {
            internal: get("INTERNAL_NUMBER").unwrap_or(defaults.internal),
            entry: get("ENTRY_NUMBER").unwrap_or(defaults.entry),
            exit: get("EXIT_NUMBER").unwrap_or(defaults.exit),
        };

        let allowed_users = match get("ALLOWED_USERS") {
            None => HashSet::new(),
            Some(value) => value
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(|id| {
                    id.parse::<u64>().map(UserId).map_err(|_| ConfigError::Invalid {
                        name: "ALLOWED_USERS",
                        value: id.to_string(),
                    })
                })
                .collect::<Result<_, _>>()?,
        };

        let log_chat_id = get("LOG_CHAT_ID")
            .map(|value| {
                value
                    .parse::<i64>()
                    .map(ChatId)
                    .map_err(|_| ConfigError::Invalid { name: "LOG_CHAT_ID", value })
            })
            .transpose()?;

        let data_dir = get("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            zadarma_api_key,
            zadarma_api_secret,
            telegram_token,
            sandbox,
            zadarma_base_url: get("ZADARMA_BASE_URL"),
            destinations,
            allowed_users,
            log_chat_id,
            data_dir,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
