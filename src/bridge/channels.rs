//! Bridge channel management.
//!
//! Creates every cross-task channel in one place so `main` can hand the
//! right ends to the right tasks.

use tokio::sync::mpsc;

use crate::common::messages::{BridgeEvent, SlackOutbound};

/// Bundle of all channels created by the bridge.
pub struct ChannelBundle {
    /// Event intake, cloned into every producer task.
    pub event_tx: mpsc::UnboundedSender<BridgeEvent>,
    /// The bridge actor's end of the event stream.
    pub event_rx: mpsc::UnboundedReceiver<BridgeEvent>,
    /// Outbound Slack posts, written by the bridge actor.
    pub slack_tx: mpsc::UnboundedSender<SlackOutbound>,
    /// The Web API task's end of the outbound queue.
    pub slack_rx: mpsc::UnboundedReceiver<SlackOutbound>,
}

impl ChannelBundle {
    pub fn new() -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (slack_tx, slack_rx) = mpsc::unbounded_channel();

        Self {
            event_tx,
            event_rx,
            slack_tx,
            slack_rx,
        }
    }
}

impl Default for ChannelBundle {
    fn default() -> Self {
        Self::new()
    }
}
