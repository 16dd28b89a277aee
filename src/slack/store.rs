//! In-memory snapshot of the Slack workspace.
//!
//! Populated from the `rtm.start` payload, refreshed only by `user_change`
//! events. Read-only from everywhere except the bridge's event handlers.

use std::collections::HashMap;

use crate::slack::events::{RtmStart, SlackChannel, SlackDm, SlackGroup, SlackUser};

/// A conversation a message can arrive in.
#[derive(Debug)]
pub enum Conversation<'a> {
    Channel(&'a SlackChannel),
    Group(&'a SlackGroup),
    Dm(&'a SlackDm),
}

impl Conversation<'_> {
    /// The display name the channel mapping is keyed by: `#name` for public
    /// channels, the bare name for groups, the peer user ID for DMs.
    pub fn display_name(&self) -> String {
        match self {
            Conversation::Channel(c) => format!("#{}", c.name),
            Conversation::Group(g) => g.name.clone(),
            Conversation::Dm(d) => d.user.clone(),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Conversation::Channel(c) => &c.id,
            Conversation::Group(g) => &g.id,
            Conversation::Dm(d) => &d.id,
        }
    }

    pub fn members(&self) -> &[String] {
        match self {
            Conversation::Channel(c) => &c.members,
            Conversation::Group(g) => &g.members,
            Conversation::Dm(_) => &[],
        }
    }
}

/// Workspace data store.
#[derive(Debug, Default)]
pub struct SlackStore {
    users: HashMap<String, SlackUser>,
    channels: HashMap<String, SlackChannel>,
    groups: HashMap<String, SlackGroup>,
    ims: HashMap<String, SlackDm>,
    /// The bridge bot's own Slack user ID.
    self_id: String,
}

impl SlackStore {
    pub fn from_rtm_start(start: &RtmStart) -> Self {
        Self {
            users: start
                .users
                .iter()
                .map(|u| (u.id.clone(), u.clone()))
                .collect(),
            channels: start
                .channels
                .iter()
                .map(|c| (c.id.clone(), c.clone()))
                .collect(),
            groups: start
                .groups
                .iter()
                .map(|g| (g.id.clone(), g.clone()))
                .collect(),
            ims: start.ims.iter().map(|d| (d.id.clone(), d.clone())).collect(),
            self_id: start
                .this_bot
                .as_ref()
                .map(|s| s.id.clone())
                .unwrap_or_default(),
        }
    }

    /// The bot's own user ID.
    pub fn active_user_id(&self) -> &str {
        &self.self_id
    }

    pub fn get_user_by_id(&self, id: &str) -> Option<&SlackUser> {
        self.users.get(id)
    }

    pub fn get_channel_by_id(&self, id: &str) -> Option<&SlackChannel> {
        self.channels.get(id)
    }

    /// Resolve any conversation ID (channel, group or DM).
    pub fn get_channel_group_or_dm_by_id(&self, id: &str) -> Option<Conversation<'_>> {
        if let Some(c) = self.channels.get(id) {
            return Some(Conversation::Channel(c));
        }
        if let Some(g) = self.groups.get(id) {
            return Some(Conversation::Group(g));
        }
        self.ims.get(id).map(Conversation::Dm)
    }

    /// Look a channel or group up by display name; a leading `#` is
    /// accepted and ignored.
    pub fn get_channel_or_group_by_name(&self, name: &str) -> Option<Conversation<'_>> {
        let bare = name.strip_prefix('#').unwrap_or(name);
        if let Some(c) = self.channels.values().find(|c| c.name == bare) {
            return Some(Conversation::Channel(c));
        }
        self.groups
            .values()
            .find(|g| g.name == bare)
            .map(Conversation::Group)
    }

    /// Whether the user is a bot account (the bridge's own included).
    pub fn is_bot_user(&self, id: &str) -> bool {
        id == self.self_id || self.users.get(id).map(|u| u.is_bot).unwrap_or(false)
    }

    /// Replace the stored record for a user (from `user_change`).
    pub fn update_user(&mut self, user: SlackUser) {
        self.users.insert(user.id.clone(), user);
    }

    /// Channel-ID -> name map for the text transform.
    pub fn channel_name_map(&self) -> HashMap<String, String> {
        self.channels
            .values()
            .map(|c| (c.id.clone(), c.name.clone()))
            .collect()
    }

    /// User-ID -> display-name map for the text transform.
    pub fn user_name_map(&self) -> HashMap<String, String> {
        self.users
            .values()
            .map(|u| (u.id.clone(), u.name.clone()))
            .collect()
    }

    /// `(name, id)` pairs for the members of a conversation, for mention
    /// highlighting on the IRC -> Slack path.
    pub fn member_names(&self, conversation: &Conversation<'_>) -> Vec<(String, String)> {
        conversation
            .members()
            .iter()
            .filter_map(|id| {
                self.users
                    .get(id)
                    .map(|u| (u.name.clone(), u.id.clone()))
            })
            .collect()
    }
}
