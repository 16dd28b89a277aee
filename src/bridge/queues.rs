//! Per-user outbound message queues.
//!
//! Slack messages wait here until the user's shadow client has joined the
//! target IRC channel. Queues are FIFO per (user, IRC channel); a user's
//! channels keep their first-enqueue order, which the dispatcher relies on
//! for its head-of-line semantics.

use std::collections::{HashMap, VecDeque};

use crate::slack::events::SlackFile;

/// A Slack message waiting for its shadow to be ready.
#[derive(Debug, Clone)]
pub struct QueuedMessage {
    pub text: String,
    pub subtype: Option<String>,
    pub file: Option<SlackFile>,
}

#[derive(Debug, Default)]
struct ChannelQueue {
    channel: String,
    pending: VecDeque<QueuedMessage>,
}

/// All users' queues.
#[derive(Debug, Default)]
pub struct MessageQueues {
    queues: HashMap<String, Vec<ChannelQueue>>,
}

impl MessageQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message for `(user, irc_channel)` in arrival order.
    pub fn enqueue(&mut self, user_id: &str, irc_channel: &str, message: QueuedMessage) {
        let channels = self.queues.entry(user_id.to_string()).or_default();
        match channels.iter_mut().find(|q| q.channel == irc_channel) {
            Some(queue) => queue.pending.push_back(message),
            None => channels.push(ChannelQueue {
                channel: irc_channel.to_string(),
                pending: VecDeque::from([message]),
            }),
        }
    }

    /// Whether the user has anything queued.
    pub fn has_pending(&self, user_id: &str) -> bool {
        self.queues.contains_key(user_id)
    }

    /// Drain the user's queues in channel order, stopping the whole pass at
    /// the first channel `joined` rejects. Returns `(channel, message)`
    /// pairs in send order; drained channels are removed.
    pub fn drain_joined<F>(&mut self, user_id: &str, joined: F) -> Vec<(String, QueuedMessage)>
    where
        F: Fn(&str) -> bool,
    {
        let Some(channels) = self.queues.get_mut(user_id) else {
            return Vec::new();
        };

        let mut out = Vec::new();
        let mut drained = 0;
        for queue in channels.iter_mut() {
            if !joined(&queue.channel) {
                break;
            }
            out.extend(
                queue
                    .pending
                    .drain(..)
                    .map(|m| (queue.channel.clone(), m)),
            );
            drained += 1;
        }
        channels.drain(..drained);

        if channels.is_empty() {
            self.queues.remove(user_id);
        }
        out
    }
}
