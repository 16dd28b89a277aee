//! Environment variable overrides for configuration.
//!
//! Supported overrides:
//! - `DOPPEL_SLACK_TOKEN` - Slack API token
//! - `DOPPEL_IRC_SERVER` - IRC server host
//! - `DOPPEL_IRC_NICKNAME` - bridge bot nick
//! - `DOPPEL_CONFIG` - config file path

use std::env;

use crate::config::types::Config;

/// Environment variable prefix for all config overrides.
const ENV_PREFIX: &str = "DOPPEL";

/// Apply environment variable overrides to a config.
///
/// Lets the token live outside the config file.
pub fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(token) = env::var(format!("{}_SLACK_TOKEN", ENV_PREFIX)) {
        config.slack.token = token;
    }
    if let Ok(server) = env::var(format!("{}_IRC_SERVER", ENV_PREFIX)) {
        config.irc.server = server;
    }
    if let Ok(nickname) = env::var(format!("{}_IRC_NICKNAME", ENV_PREFIX)) {
        config.irc.nickname = nickname;
    }
    config
}

/// Config file path from the environment, or the default.
pub fn get_config_path() -> String {
    env::var(format!("{}_CONFIG", ENV_PREFIX)).unwrap_or_else(|_| "doppel.conf".to_string())
}
