//! Error types for the application.

use thiserror::Error;

/// Top-level application error.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IRC error: {0}")]
    Irc(#[from] IrcError),

    #[error("Slack error: {0}")]
    Slack(#[from] SlackError),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

/// IRC-side errors.
#[derive(Debug, Error)]
pub enum IrcError {
    #[error("Connection attempts exhausted for {nick}")]
    RetriesExhausted { nick: String },

    #[error(transparent)]
    Client(#[from] irc::error::Error),
}

/// Slack-side errors.
#[derive(Debug, Error)]
pub enum SlackError {
    #[error("Slack API call '{method}' failed: {message}")]
    Api { method: String, message: String },

    #[error("RTM socket error: {0}")]
    Socket(String),

    #[error("Malformed RTM payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Result type alias using AppError.
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type alias for Slack operations.
pub type SlackResult<T> = std::result::Result<T, SlackError>;

/// Result type alias for IRC operations.
pub type IrcResult<T> = std::result::Result<T, IrcError>;
