//! Configuration validation.
//!
//! Collects every problem instead of failing at the first one.

use crate::bridge::channel_map::ChannelMap;
use crate::common::error::ConfigError;
use crate::config::types::Config;

/// Validate a configuration and return detailed errors.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.irc.server.is_empty() {
        errors.push("irc.server is required".to_string());
    }
    if config.irc.nickname.is_empty() {
        errors.push("irc.nickname is required".to_string());
    }
    if config.irc.timeout_seconds == 0 {
        errors.push("irc.timeout_seconds must be greater than zero".to_string());
    }
    if config.irc.user_nick_suffix.len() >= crate::text::nick::SERVER_NICKLEN {
        errors.push(format!(
            "irc.user_nick_suffix '{}' leaves no room for a nick (max {} chars total)",
            config.irc.user_nick_suffix,
            crate::text::nick::SERVER_NICKLEN
        ));
    }

    if config.slack.token.is_empty() {
        errors.push(
            "slack.token is required (set in config or use DOPPEL_SLACK_TOKEN env var)"
                .to_string(),
        );
    }

    if config.bridge.channel_mapping.is_empty() {
        errors.push("bridge.channel_mapping is empty - nothing to relay".to_string());
    }
    // An injective mapping is required for the reverse direction; reuse the
    // builder's checks.
    if let Err(e) = ChannelMap::from_config(&config.bridge.channel_mapping) {
        errors.push(e.to_string());
    }
    for (slack_channel, value) in &config.bridge.channel_mapping {
        if value.split_whitespace().count() > 2 {
            errors.push(format!(
                "channel_mapping['{}'] has more than 'channel password': '{}'",
                slack_channel, value
            ));
        }
    }

    for (i, prefix) in config.bridge.command_characters.iter().enumerate() {
        if prefix.chars().count() != 1 {
            errors.push(format!(
                "bridge.command_characters[{}] must be a single character, got '{}'",
                i, prefix
            ));
        }
    }

    for (i, command) in config.irc.auto_send_commands.iter().enumerate() {
        if command.is_empty() {
            errors.push(format!("irc.auto_send_commands[{}] is empty", i));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            message: errors.join("\n"),
        })
    }
}
