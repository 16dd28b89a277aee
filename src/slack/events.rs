//! Serde types for the Slack RTM protocol.
//!
//! Only the events and object fields the bridge consumes are modeled;
//! everything else in the payload is ignored by serde.

use serde::Deserialize;

/// Events read off the RTM socket.
///
/// Unknown `type` values fail to parse and are skipped by the RTM task.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackEvent {
    /// First frame after the socket opens.
    Hello,
    Message(MessageEvent),
    PresenceChange(PresenceChangeEvent),
    UserChange(UserChangeEvent),
    Error { error: ErrorDetail },
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageEvent {
    pub subtype: Option<String>,
    pub user: Option<String>,
    pub channel: String,
    #[serde(default)]
    pub text: String,
    pub file: Option<SlackFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PresenceChangeEvent {
    pub user: String,
    pub presence: Presence,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserChangeEvent {
    pub user: SlackUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    pub code: Option<i64>,
    pub msg: Option<String>,
}

/// The two presence states RTM reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Active,
    Away,
}

/// Uploaded file metadata carried by `file_share` messages.
#[derive(Debug, Clone, Deserialize)]
pub struct SlackFile {
    #[serde(default)]
    pub permalink: String,
    pub initial_comment: Option<InitialComment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InitialComment {
    #[serde(default)]
    pub comment: String,
}

// ---------------------------------------------------------------------------
// Objects from the `rtm.start` bootstrap payload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SlackUser {
    pub id: String,
    pub name: String,
    pub presence: Option<Presence>,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackChannel {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub members: Vec<String>,
}

/// A direct-message conversation.
#[derive(Debug, Clone, Deserialize)]
pub struct SlackDm {
    pub id: String,
    pub user: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackSelf {
    pub id: String,
    pub name: String,
}

/// `rtm.start` response: socket URL plus a data-store snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct RtmStart {
    #[serde(default)]
    pub ok: bool,
    pub error: Option<String>,
    pub url: Option<String>,
    #[serde(rename = "self")]
    pub this_bot: Option<SlackSelf>,
    #[serde(default)]
    pub users: Vec<SlackUser>,
    #[serde(default)]
    pub channels: Vec<SlackChannel>,
    #[serde(default)]
    pub groups: Vec<SlackGroup>,
    #[serde(default)]
    pub ims: Vec<SlackDm>,
}
