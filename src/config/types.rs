//! Configuration type definitions.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub irc: IrcConfig,
    pub slack: SlackConfig,
    pub bridge: BridgeConfig,
    /// Default tracing directive, overridable with RUST_LOG.
    pub loglevel: Option<String>,
}

/// IRC server and client behavior.
#[derive(Debug, Clone, Deserialize)]
pub struct IrcConfig {
    pub server: String,
    /// Nick of the bridge bot connection.
    pub nickname: String,
    #[serde(default)]
    pub options: IrcOptions,
    #[serde(default)]
    pub status_notices: StatusNotices,
    /// Suffix appended to every shadow nick.
    #[serde(default = "default_nick_suffix")]
    pub user_nick_suffix: String,
    /// Grace period before an away user's shadow disconnects.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Raw commands sent after the bot registers, e.g. [["MODE","nick","+x"]].
    #[serde(default)]
    pub auto_send_commands: Vec<Vec<String>>,
}

/// Overrides for the underlying IRC client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IrcOptions {
    pub port: Option<u16>,
    pub use_tls: Option<bool>,
    pub realname: Option<String>,
}

/// Which IRC membership changes get posted into Slack.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct StatusNotices {
    #[serde(default)]
    pub join: bool,
    /// Covers both PART and QUIT.
    #[serde(default)]
    pub leave: bool,
}

/// Slack workspace access and presentation.
#[derive(Debug, Clone, Deserialize)]
pub struct SlackConfig {
    pub token: String,
    /// Drop messages authored by Slack's built-in `slackbot`.
    #[serde(default)]
    pub mute_slackbot: bool,
    /// `false` disables avatars; a string is a template with `$username`.
    #[serde(default = "default_avatar_url")]
    pub avatar_url: AvatarUrl,
}

/// Avatar template or the literal `false`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AvatarUrl {
    Toggle(bool),
    Template(String),
}

impl AvatarUrl {
    /// The template, unless avatars are disabled.
    pub fn template(&self) -> Option<&str> {
        match self {
            AvatarUrl::Template(t) => Some(t),
            AvatarUrl::Toggle(true) => Some(DEFAULT_AVATAR_TEMPLATE),
            AvatarUrl::Toggle(false) => None,
        }
    }
}

/// Channel mapping and command handling.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Slack channel display name -> "irc-channel [password]".
    pub channel_mapping: HashMap<String, String>,
    /// Characters that mark a Slack message as a command.
    #[serde(default)]
    pub command_characters: Vec<String>,
}

const DEFAULT_AVATAR_TEMPLATE: &str = "https://robohash.org/$username.png?size=48x48";

fn default_nick_suffix() -> String {
    "-slack".to_string()
}

fn default_timeout_seconds() -> u64 {
    120
}

fn default_avatar_url() -> AvatarUrl {
    AvatarUrl::Template(DEFAULT_AVATAR_TEMPLATE.to_string())
}

impl Config {
    /// Command prefixes as chars (invalid entries are dropped by
    /// validation before this is used).
    pub fn command_chars(&self) -> Vec<char> {
        self.bridge
            .command_characters
            .iter()
            .filter_map(|s| s.chars().next())
            .collect()
    }

    pub fn away_timeout(&self) -> Duration {
        Duration::from_secs(self.irc.timeout_seconds)
    }
}
