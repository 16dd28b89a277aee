//! Slack channel ↔ IRC channel mapping.
//!
//! Built once from configuration. Slack names keep their leading `#` for
//! public channels; IRC names are lowercased. A configured IRC value may
//! carry a join password after a space, which is stripped from the mapping
//! but remembered for the JOIN command.

use std::collections::HashMap;

use crate::common::error::ConfigError;

/// Bidirectional channel lookup plus join passwords.
#[derive(Debug, Clone, Default)]
pub struct ChannelMap {
    slack_to_irc: HashMap<String, String>,
    irc_to_slack: HashMap<String, String>,
    passwords: HashMap<String, String>,
}

impl ChannelMap {
    /// Build from the configured `channel_mapping` table.
    ///
    /// Fails when two Slack channels map to the same IRC channel: the
    /// reverse direction would be ambiguous.
    pub fn from_config(mapping: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut map = Self::default();

        for (slack_channel, value) in mapping {
            let mut tokens = value.split_whitespace();
            let irc_channel = tokens
                .next()
                .ok_or_else(|| ConfigError::ValidationError {
                    message: format!("channel_mapping['{}'] is empty", slack_channel),
                })?
                .to_lowercase();
            let password = tokens.next();

            if let Some(previous) = map.irc_to_slack.get(&irc_channel) {
                return Err(ConfigError::ValidationError {
                    message: format!(
                        "channel_mapping: both '{}' and '{}' map to IRC channel '{}'",
                        previous, slack_channel, irc_channel
                    ),
                });
            }

            if let Some(password) = password {
                map.passwords
                    .insert(irc_channel.clone(), password.to_string());
            }
            map.irc_to_slack
                .insert(irc_channel.clone(), slack_channel.clone());
            map.slack_to_irc.insert(slack_channel.clone(), irc_channel);
        }

        Ok(map)
    }

    /// IRC channel for a Slack channel display name.
    pub fn irc_channel(&self, slack_channel: &str) -> Option<&str> {
        self.slack_to_irc.get(slack_channel).map(String::as_str)
    }

    /// Slack channel display name for an IRC channel.
    pub fn slack_channel(&self, irc_channel: &str) -> Option<&str> {
        self.irc_to_slack
            .get(&irc_channel.to_lowercase())
            .map(String::as_str)
    }

    /// Join password for an IRC channel, when one was configured.
    pub fn password(&self, irc_channel: &str) -> Option<&str> {
        self.passwords.get(irc_channel).map(String::as_str)
    }

    /// Whether the IRC channel is part of the bridge (invite acceptance).
    pub fn has_irc_channel(&self, irc_channel: &str) -> bool {
        self.irc_to_slack.contains_key(&irc_channel.to_lowercase())
    }

    /// All IRC channels, for joining at registration.
    pub fn irc_channels(&self) -> impl Iterator<Item = &str> {
        self.irc_to_slack.keys().map(String::as_str)
    }

    /// All Slack channel display names, for the startup shadow sweep.
    pub fn slack_channels(&self) -> impl Iterator<Item = &str> {
        self.slack_to_irc.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_bidirectional_lookup() {
        let map = ChannelMap::from_config(&mapping(&[("#general", "#irc-general")])).unwrap();
        assert_eq!(map.irc_channel("#general"), Some("#irc-general"));
        assert_eq!(map.slack_channel("#irc-general"), Some("#general"));
        assert_eq!(map.irc_channel("#nowhere"), None);
    }

    #[test]
    fn test_irc_names_lowercased() {
        let map = ChannelMap::from_config(&mapping(&[("#general", "#IRC-General")])).unwrap();
        assert_eq!(map.irc_channel("#general"), Some("#irc-general"));
        assert_eq!(map.slack_channel("#IRC-GENERAL"), Some("#general"));
    }

    #[test]
    fn test_password_stripped_but_kept() {
        let map = ChannelMap::from_config(&mapping(&[("#ops", "#irc-ops hunter2")])).unwrap();
        assert_eq!(map.irc_channel("#ops"), Some("#irc-ops"));
        assert_eq!(map.password("#irc-ops"), Some("hunter2"));
        assert_eq!(map.password("#irc-general"), None);
    }

    #[test]
    fn test_duplicate_irc_channel_rejected() {
        let result = ChannelMap::from_config(&mapping(&[
            ("#a", "#shared"),
            ("#b", "#shared"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_group_names_without_hash() {
        let map = ChannelMap::from_config(&mapping(&[("backroom", "#irc-private")])).unwrap();
        assert_eq!(map.irc_channel("backroom"), Some("#irc-private"));
        assert_eq!(map.slack_channel("#irc-private"), Some("backroom"));
    }
}
