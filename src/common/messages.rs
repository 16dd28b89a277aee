//! Canonical message types for cross-task communication.
//!
//! Everything that flows between the connection tasks, the Slack tasks and
//! the bridge actor is defined here.

use crate::irc::events::IrcEvent;
use crate::slack::events::{RtmStart, SlackEvent};

/// Which IRC connection produced an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrcSource {
    /// The bridge bot's own connection.
    Bot,
    /// A shadow connection, tagged with its Slack user ID.
    Shadow(String),
}

/// The single event stream the bridge actor consumes.
#[derive(Debug)]
pub enum BridgeEvent {
    /// Fresh workspace snapshot from `rtm.start` (initial connect and every
    /// RTM reconnect). Always followed by `Slack(Hello)`.
    SlackSnapshot(Box<RtmStart>),
    Slack(SlackEvent),
    Irc { source: IrcSource, event: IrcEvent },
    /// A shadow's away grace period elapsed.
    AwayTimeout { user_id: String },
}

/// Outbound traffic for the Slack Web API task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlackOutbound {
    Post {
        channel_id: String,
        text: String,
        /// IRC author to impersonate; `None` posts as the bridge itself.
        username: Option<String>,
        icon_url: Option<String>,
    },
    /// Open a DM with the user and post into it.
    Dm { user_id: String, text: String },
}

/// Why the bridge's run loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Event sources all closed (shutdown).
    Shutdown,
    /// The bot's IRC connection aborted; the process must exit non-zero.
    BotAborted,
}
