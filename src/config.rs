//! Configuration types.
//!
//! Everything is read from the environment once at startup and passed down
//! as explicit values; no component reads the environment afterwards.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default OpenWeatherMap API root.
pub const DEFAULT_WEATHER_API_BASE: &str = "https://api.openweathermap.org/data/2.5";

/// Default Telegram Bot API root.
pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Root configuration for the bot process.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub weather: WeatherConfig,
    pub transport: TransportConfig,
    pub dialog: DialogConfig,
    /// Directory for rolling log files. Console only when unset.
    pub log_dir: Option<PathBuf>,
}

/// Upstream weather API settings.
#[derive(Debug, Clone)]
pub struct WeatherConfig {
    pub api_key: SecretString,
    pub base_url: String,
    /// Language code for condition descriptions.
    pub lang: String,
    /// Upper bound on a single upstream request.
    pub timeout: Duration,
}

impl WeatherConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            base_url: DEFAULT_WEATHER_API_BASE.to_string(),
            lang: "en".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Which transport the bot talks through.
#[derive(Debug, Clone)]
pub enum TransportConfig {
    Telegram(TelegramConfig),
    /// stdin/stdout REPL for local testing.
    Cli,
}

/// Telegram Bot API settings.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    pub api_base: String,
    /// Long-poll timeout passed to `getUpdates`.
    pub poll_timeout_secs: u64,
    /// Usernames or numeric ids allowed to talk to the bot; `*` allows everyone.
    pub allowed_users: Vec<String>,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: SecretString::from(bot_token.into()),
            api_base: DEFAULT_TELEGRAM_API_BASE.to_string(),
            poll_timeout_secs: 30,
            allowed_users: vec!["*".to_string()],
        }
    }
}

/// Dialog dispatch settings.
#[derive(Debug, Clone)]
pub struct DialogConfig {
    /// How long a per-chat lane may sit idle before it is retired.
    pub lane_idle: Duration,
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            lane_idle: Duration::from_secs(300), // 5 minutes
        }
    }
}

impl BotConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require =
            |key: &str| get(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()));

        let api_key = require("WEATHER_API_KEY")?;
        let base_url = get("WEATHER_API_BASE")
            .unwrap_or_else(|| DEFAULT_WEATHER_API_BASE.to_string());
        validate_http_url("WEATHER_API_BASE", &base_url)?;

        let timeout_secs = parse_number(&get, "WEATHER_TIMEOUT_SECS", 10)?;
        if !(1..=120).contains(&timeout_secs) {
            return Err(ConfigError::InvalidValue {
                key: "WEATHER_TIMEOUT_SECS".into(),
                message: format!("must be between 1 and 120 seconds, got {timeout_secs}"),
            });
        }

        let weather = WeatherConfig {
            api_key: SecretString::from(api_key),
            base_url: base_url.trim_end_matches('/').to_string(),
            lang: get("WEATHER_LANG").unwrap_or_else(|| "en".to_string()),
            timeout: Duration::from_secs(timeout_secs),
        };

        let channel = get("BOT_CHANNEL").unwrap_or_else(|| "telegram".to_string());
        let transport = match channel.to_lowercase().as_str() {
            "telegram" => {
                let bot_token = require("TELEGRAM_BOT_TOKEN")?;
                let api_base = get("TELEGRAM_API_BASE")
                    .unwrap_or_else(|| DEFAULT_TELEGRAM_API_BASE.to_string());
                validate_http_url("TELEGRAM_API_BASE", &api_base)?;

                let allowed_users: Vec<String> = get("TELEGRAM_ALLOWED_USERS")
                    .unwrap_or_else(|| "*".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();

                TransportConfig::Telegram(TelegramConfig {
                    bot_token: SecretString::from(bot_token),
                    api_base: api_base.trim_end_matches('/').to_string(),
                    poll_timeout_secs: parse_number(&get, "TELEGRAM_POLL_TIMEOUT_SECS", 30)?,
                    allowed_users,
                })
            }
            "cli" => TransportConfig::Cli,
            other => {
                return Err(ConfigError::InvalidValue {
                    key: "BOT_CHANNEL".into(),
                    message: format!("expected 'telegram' or 'cli', got '{other}'"),
                });
            }
        };

        let dialog = DialogConfig {
            lane_idle: Duration::from_secs(parse_number(&get, "BOT_LANE_IDLE_SECS", 300)?),
        };

        Ok(Self {
            weather,
            transport,
            dialog,
            log_dir: get("BOT_LOG_DIR").map(PathBuf::from),
        })
    }
}

fn parse_number<G>(get: &G, key: &str, default: u64) -> Result<u64, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a whole number, got '{raw}'"),
        }),
        None => Ok(default),
    }
}

fn validate_http_url(key: &str, url: &str) -> Result<(), ConfigError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must be an http:// or https:// URL".into(),
        })
    }
}
