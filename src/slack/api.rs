//! Slack Web API client and the outbound posting task.
//!
//! Three methods are consumed: `rtm.start` (bootstrap), `chat.postMessage`
//! (all IRC -> Slack traffic and command replies) and `im.open` (the DM
//! channel for nickname complaints).

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::common::error::{SlackError, SlackResult};
use crate::common::messages::SlackOutbound;
use crate::slack::events::RtmStart;

const API_BASE: &str = "https://slack.com/api";

/// Thin client over the Slack Web API.
#[derive(Debug, Clone)]
pub struct SlackApi {
    http: reqwest::Client,
    token: String,
}

impl SlackApi {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: token.into(),
        }
    }

    /// POST a Web API method with form parameters; returns the decoded
    /// JSON body after checking Slack's `ok` flag.
    async fn call(
        &self,
        method: &str,
        params: &[(&str, &str)],
    ) -> SlackResult<serde_json::Value> {
        let mut form: Vec<(&str, &str)> = vec![("token", self.token.as_str())];
        form.extend_from_slice(params);

        let body: serde_json::Value = self
            .http
            .post(format!("{}/{}", API_BASE, method))
            .form(&form)
            .send()
            .await?
            .json()
            .await?;

        if body.get("ok").and_then(|v| v.as_bool()).unwrap_or(false) {
            Ok(body)
        } else {
            Err(SlackError::Api {
                method: method.to_string(),
                message: body
                    .get("error")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown error")
                    .to_string(),
            })
        }
    }

    /// Fetch the RTM socket URL and the workspace snapshot.
    pub async fn rtm_start(&self) -> SlackResult<RtmStart> {
        let body = self.call("rtm.start", &[]).await?;
        let start: RtmStart = serde_json::from_value(body)?;
        Ok(start)
    }

    /// Post a message, optionally impersonating an IRC author.
    pub async fn post_message(
        &self,
        channel_id: &str,
        text: &str,
        username: Option<&str>,
        icon_url: Option<&str>,
    ) -> SlackResult<()> {
        let mut params: Vec<(&str, &str)> =
            vec![("channel", channel_id), ("text", text), ("parse", "full")];
        if let Some(username) = username {
            params.push(("username", username));
        }
        if let Some(icon) = icon_url {
            params.push(("icon_url", icon));
        }
        self.call("chat.postMessage", &params).await?;
        Ok(())
    }

    /// Open (or reuse) a DM conversation with a user; returns its channel ID.
    pub async fn open_dm(&self, user_id: &str) -> SlackResult<String> {
        let body = self.call("im.open", &[("user", user_id)]).await?;
        body.pointer("/channel/id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| SlackError::Api {
                method: "im.open".to_string(),
                message: "response missing channel.id".to_string(),
            })
    }
}

/// Drain the bridge's outbound queue into the Web API.
///
/// Failures are logged and dropped; the bridge never blocks on Slack.
pub async fn run_outbound_loop(api: SlackApi, mut rx: mpsc::UnboundedReceiver<SlackOutbound>) {
    info!("Starting Slack outbound loop");

    while let Some(outbound) = rx.recv().await {
        match outbound {
            SlackOutbound::Post {
                channel_id,
                text,
                username,
                icon_url,
            } => {
                debug!(channel = %channel_id, "Posting to Slack");
                if let Err(e) = api
                    .post_message(&channel_id, &text, username.as_deref(), icon_url.as_deref())
                    .await
                {
                    error!(channel = %channel_id, error = %e, "chat.postMessage failed");
                }
            }
            SlackOutbound::Dm { user_id, text } => {
                match api.open_dm(&user_id).await {
                    Ok(dm_channel) => {
                        if let Err(e) = api.post_message(&dm_channel, &text, None, None).await {
                            error!(user = %user_id, error = %e, "DM post failed");
                        }
                    }
                    Err(e) => error!(user = %user_id, error = %e, "im.open failed"),
                }
            }
        }
    }

    warn!("Slack outbound loop ended");
}
