//! Error types for the weather bot.

use std::time::Duration;

/// Top-level error type for the bot.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Navigation error: {0}")]
    Navigation(#[from] NavigationError),

    #[error("Weather error: {0}")]
    Weather(#[from] WeatherError),
}

/// Configuration-related errors. All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Transport (channel) errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },
}

/// An inbound event that cannot be mapped onto a navigation action.
///
/// A correct transport never produces these for buttons the bot rendered
/// itself; they show up for stale keyboards or hand-crafted payloads.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavigationError {
    #[error("Unknown action kind '{0}' in callback token")]
    UnknownAction(String),

    #[error("Malformed callback token: {0:?}")]
    MalformedToken(String),

    #[error("City name is empty")]
    EmptyCity,

    #[error("Unknown command: /{0}")]
    UnknownCommand(String),
}

impl NavigationError {
    /// Polite text shown to the user when their request is rejected.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::UnknownAction(_) | Self::MalformedToken(_) => {
                "This button is no longer available. Send /start to begin again."
            }
            Self::EmptyCity => "Please enter a city name.",
            Self::UnknownCommand(_) => "Unknown command. Send /start to see what I can do.",
        }
    }
}

/// A failed weather lookup.
///
/// Callers only ever see "lookup failed"; the distinguished cause is kept as
/// the error source for logging.
#[derive(Debug, thiserror::Error)]
#[error("weather lookup failed for {city}")]
pub struct WeatherError {
    pub city: String,
    #[source]
    pub cause: LookupCause,
}

impl WeatherError {
    pub fn new(city: impl Into<String>, cause: LookupCause) -> Self {
        Self {
            city: city.into(),
            cause,
        }
    }
}

/// Internal reason behind a [`WeatherError`].
#[derive(Debug, thiserror::Error)]
pub enum LookupCause {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),

    #[error("upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed upstream response: {0}")]
    Malformed(String),

    #[error("forecast series has {available} samples, sample {index} requested")]
    MissingSample { index: usize, available: usize },
}

/// Result type alias for the bot.
pub type Result<T> = std::result::Result<T, Error>;
