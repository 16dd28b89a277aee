//! Shadow client registry.
//!
//! One entry per Slack user with a live IRC connection. The bridge actor is
//! the only writer. Away grace periods are spawned sleeps that post an
//! `AwayTimeout` event back to the bridge; cancelling aborts the sleep, and
//! a timeout that lost the race to a cancellation is recognized by the
//! entry no longer holding a timer.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::common::messages::BridgeEvent;
use crate::irc::client::IrcHandle;
use crate::irc::events::IrcAction;
use crate::text::nick;

/// A Slack user's IRC presence.
#[derive(Debug)]
pub struct ShadowClient {
    pub user_id: String,
    pub slack_name: String,
    pub nick: String,
    pub handle: IrcHandle,
    /// IRC channels the server has confirmed via NAMES.
    pub joined: HashSet<String>,
    away_timer: Option<JoinHandle<()>>,
}

impl ShadowClient {
    pub fn new(user_id: String, slack_name: String, nick: String, handle: IrcHandle) -> Self {
        Self {
            user_id,
            slack_name,
            nick,
            handle,
            joined: HashSet::new(),
            away_timer: None,
        }
    }

    pub fn has_joined(&self, irc_channel: &str) -> bool {
        self.joined.contains(&irc_channel.to_lowercase())
    }

    pub fn mark_joined(&mut self, irc_channel: &str) {
        self.joined.insert(irc_channel.to_lowercase());
    }
}

impl Drop for ShadowClient {
    fn drop(&mut self) {
        if let Some(timer) = self.away_timer.take() {
            timer.abort();
        }
    }
}

/// All live shadows, keyed by Slack user ID.
#[derive(Debug)]
pub struct ShadowRegistry {
    shadows: HashMap<String, ShadowClient>,
    nick_suffix: String,
    away_timeout: Duration,
    event_tx: mpsc::UnboundedSender<BridgeEvent>,
}

impl ShadowRegistry {
    pub fn new(
        nick_suffix: String,
        away_timeout: Duration,
        event_tx: mpsc::UnboundedSender<BridgeEvent>,
    ) -> Self {
        Self {
            shadows: HashMap::new(),
            nick_suffix,
            away_timeout,
            event_tx,
        }
    }

    pub fn nick_suffix(&self) -> &str {
        &self.nick_suffix
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.shadows.contains_key(user_id)
    }

    pub fn get(&self, user_id: &str) -> Option<&ShadowClient> {
        self.shadows.get(user_id)
    }

    pub fn get_mut(&mut self, user_id: &str) -> Option<&mut ShadowClient> {
        self.shadows.get_mut(user_id)
    }

    pub fn insert(&mut self, shadow: ShadowClient) {
        self.shadows.insert(shadow.user_id.clone(), shadow);
    }

    /// Start (or restart) the away grace period for a user.
    pub fn schedule_away(&mut self, user_id: &str) {
        let Some(shadow) = self.shadows.get_mut(user_id) else {
            return;
        };
        if let Some(previous) = shadow.away_timer.take() {
            previous.abort();
        }

        let event_tx = self.event_tx.clone();
        let timeout = self.away_timeout;
        let user = user_id.to_string();
        debug!(user = %user_id, timeout_secs = timeout.as_secs(), "Scheduling away disconnect");
        shadow.away_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = event_tx.send(BridgeEvent::AwayTimeout { user_id: user });
        }));
    }

    /// Cancel a pending away timer, if any.
    pub fn cancel_away(&mut self, user_id: &str) {
        if let Some(shadow) = self.shadows.get_mut(user_id) {
            if let Some(timer) = shadow.away_timer.take() {
                debug!(user = %user_id, "Cancelled away disconnect");
                timer.abort();
            }
        }
    }

    /// Whether an arriving `AwayTimeout` is still valid. Consumes the timer
    /// so a cancelled-then-delivered timeout is ignored.
    pub fn claim_away_timeout(&mut self, user_id: &str) -> bool {
        self.shadows
            .get_mut(user_id)
            .and_then(|s| s.away_timer.take())
            .is_some()
    }

    /// Issue a NICK change when the user's Slack name no longer derives the
    /// stored nick. Returns true when a rename was issued.
    pub fn rename(&mut self, user_id: &str, new_slack_name: &str) -> bool {
        let suffix = self.nick_suffix.clone();
        let Some(shadow) = self.shadows.get_mut(user_id) else {
            return false;
        };

        let derived = nick::irc_nick(new_slack_name, &suffix);
        shadow.slack_name = new_slack_name.to_string();
        if shadow.nick == derived {
            return false;
        }

        shadow.handle.send(IrcAction::Nick(derived.clone()));
        shadow.nick = derived;
        true
    }

    /// Disconnect and forget a shadow.
    pub fn destroy(&mut self, user_id: &str, reason: &str) -> bool {
        match self.shadows.remove(user_id) {
            Some(mut shadow) => {
                if let Some(timer) = shadow.away_timer.take() {
                    timer.abort();
                }
                shadow.handle.send(IrcAction::Quit(reason.to_string()));
                debug!(user = %user_id, nick = %shadow.nick, reason, "Shadow destroyed");
                true
            }
            None => false,
        }
    }

    /// Forget a shadow whose connection is already gone (abort).
    pub fn remove(&mut self, user_id: &str) -> Option<ShadowClient> {
        self.shadows.remove(user_id)
    }

    /// Whether some shadow currently uses this nick (echo suppression).
    pub fn is_shadow_nick(&self, nick: &str) -> bool {
        self.shadows.values().any(|s| s.nick == nick)
    }

    pub fn find_by_nick(&self, nick: &str) -> Option<&ShadowClient> {
        self.shadows.values().find(|s| s.nick == nick)
    }

    /// Slack display name -> nick, for the Slack -> IRC mention rule.
    pub fn shadow_nick_map(&self) -> HashMap<String, String> {
        self.shadows
            .values()
            .map(|s| (s.slack_name.clone(), s.nick.clone()))
            .collect()
    }

    /// Nick -> Slack display name, for the IRC -> Slack direction.
    pub fn nick_to_slack_map(&self) -> HashMap<String, String> {
        self.shadows
            .values()
            .map(|s| (s.nick.clone(), s.slack_name.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.shadows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shadows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::irc::client::test_handle;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn registry(
        timeout: Duration,
    ) -> (ShadowRegistry, UnboundedReceiver<BridgeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ShadowRegistry::new("-slack".to_string(), timeout, tx), rx)
    }

    fn add_shadow(registry: &mut ShadowRegistry, user_id: &str, name: &str) -> UnboundedReceiver<IrcAction> {
        let (handle, actions) = test_handle();
        let nick = nick::irc_nick(name, "-slack");
        registry.insert(ShadowClient::new(
            user_id.to_string(),
            name.to_string(),
            nick,
            handle,
        ));
        actions
    }

    #[tokio::test(start_paused = true)]
    async fn test_away_timer_fires_after_timeout() {
        let (mut registry, mut events) = registry(Duration::from_secs(120));
        let _actions = add_shadow(&mut registry, "U1", "alice");

        registry.schedule_away("U1");
        tokio::time::advance(Duration::from_secs(121)).await;
        tokio::task::yield_now().await;

        match events.try_recv() {
            Ok(BridgeEvent::AwayTimeout { user_id }) => assert_eq!(user_id, "U1"),
            other => panic!("expected AwayTimeout, got {:?}", other),
        }
        assert!(registry.claim_away_timeout("U1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_within_grace_period_never_fires() {
        let (mut registry, mut events) = registry(Duration::from_secs(120));
        let _actions = add_shadow(&mut registry, "U1", "alice");

        registry.schedule_away("U1");
        tokio::time::advance(Duration::from_secs(60)).await;
        registry.cancel_away("U1");
        tokio::time::advance(Duration::from_secs(120)).await;
        tokio::task::yield_now().await;

        assert!(events.try_recv().is_err());
        assert!(!registry.claim_away_timeout("U1"));
    }

    #[tokio::test]
    async fn test_rename_issues_nick_when_derivation_changes() {
        let (mut registry, _events) = registry(Duration::from_secs(120));
        let mut actions = add_shadow(&mut registry, "U1", "alice");

        assert!(registry.rename("U1", "alicia"));
        assert_eq!(
            actions.try_recv().unwrap(),
            IrcAction::Nick("alicia-slack".to_string())
        );
        let shadow = registry.get("U1").unwrap();
        assert_eq!(shadow.nick, "alicia-slack");
        assert_eq!(shadow.slack_name, "alicia");
    }

    #[tokio::test]
    async fn test_rename_noop_when_nick_unchanged() {
        let (mut registry, _events) = registry(Duration::from_secs(120));
        let mut actions = add_shadow(&mut registry, "U1", "alice");

        assert!(!registry.rename("U1", "alice"));
        assert!(actions.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_destroy_sends_quit() {
        let (mut registry, _events) = registry(Duration::from_secs(120));
        let mut actions = add_shadow(&mut registry, "U1", "alice");

        assert!(registry.destroy("U1", "Slack user alice went away."));
        assert_eq!(
            actions.try_recv().unwrap(),
            IrcAction::Quit("Slack user alice went away.".to_string())
        );
        assert!(!registry.contains("U1"));
        assert!(!registry.destroy("U1", "again"));
    }

    #[tokio::test]
    async fn test_nick_lookups() {
        let (mut registry, _events) = registry(Duration::from_secs(120));
        let _a = add_shadow(&mut registry, "U1", "alice");
        let _b = add_shadow(&mut registry, "U2", "bob");

        assert!(registry.is_shadow_nick("alice-slack"));
        assert!(!registry.is_shadow_nick("carol-slack"));
        assert_eq!(registry.find_by_nick("bob-slack").unwrap().user_id, "U2");

        let by_name = registry.shadow_nick_map();
        assert_eq!(by_name.get("alice").unwrap(), "alice-slack");
        let by_nick = registry.nick_to_slack_map();
        assert_eq!(by_nick.get("bob-slack").unwrap(), "bob");
    }

    #[tokio::test]
    async fn test_joined_channels_case_insensitive() {
        let (mut registry, _events) = registry(Duration::from_secs(120));
        let _a = add_shadow(&mut registry, "U1", "alice");

        let shadow = registry.get_mut("U1").unwrap();
        shadow.mark_joined("#IRC-Room");
        assert!(shadow.has_joined("#irc-room"));
        assert!(shadow.has_joined("#IRC-ROOM"));
        assert!(!shadow.has_joined("#other"));
    }
}
