//! Slack-side commands (`!online`, `!topic`, `!help`).
//!
//! A Slack message whose first character is one of the configured command
//! prefixes is parsed here instead of being relayed. Replies go back to
//! the originating Slack channel through the bot's Web API path.

use std::sync::OnceLock;

use regex::Regex;

/// A parsed command. Anything unrecognized becomes `Help`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List the IRC users the bot sees, optionally in a named channel.
    Online { channel: Option<String> },
    /// Report the IRC topic of the mapped channel.
    Topic,
    Help,
}

fn command_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\w+)\s?(\w+)?").unwrap())
}

/// Whether this message text is addressed to the command parser.
pub fn is_command(text: &str, prefixes: &[char]) -> bool {
    text.chars()
        .next()
        .map(|first| prefixes.contains(&first))
        .unwrap_or(false)
}

/// Parse the text after its prefix character. Dispatch is case-sensitive.
pub fn parse(text: &str) -> Command {
    let rest = &text[text.chars().next().map(char::len_utf8).unwrap_or(0)..];
    let Some(caps) = command_pattern().captures(rest) else {
        return Command::Help;
    };
    let argument = caps.get(2).map(|m| m.as_str().to_string());

    match &caps[1] {
        "online" => Command::Online { channel: argument },
        "topic" => Command::Topic,
        _ => Command::Help,
    }
}

/// Reply text for `online`.
pub fn render_online(irc_channel: &str, mut users: Vec<String>) -> String {
    if users.is_empty() {
        return format!("No users seen on {} yet.", irc_channel);
    }
    users.sort();
    format!("Users on {}: {}", irc_channel, users.join(", "))
}

/// Reply text for `topic`.
pub fn render_topic(irc_channel: &str, topic: Option<&str>) -> String {
    match topic {
        Some(topic) if !topic.is_empty() => format!("Topic for {}: {}", irc_channel, topic),
        _ => format!("No topic set for {}.", irc_channel),
    }
}

pub fn help_text() -> &'static str {
    "Available commands: online [channel] (list IRC users), topic (show the IRC channel topic), help (this text)."
}
