//! Slack RTM socket task.
//!
//! Owns the WebSocket connection: boots via `rtm.start`, hands the bridge a
//! fresh workspace snapshot, then streams typed events. Reconnects itself
//! with exponential backoff; the bridge sees a reconnect as a new snapshot
//! followed by `Hello`.

use std::time::Duration;

use backon::BackoffBuilder;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::common::error::{SlackError, SlackResult};
use crate::common::messages::BridgeEvent;
use crate::slack::api::SlackApi;
use crate::slack::events::SlackEvent;

/// Interval between keepalive pings on the RTM socket.
const PING_INTERVAL: Duration = Duration::from_secs(30);

fn rtm_backoff() -> impl Iterator<Item = Duration> {
    backon::ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(60))
        .with_jitter()
        .without_max_times()
        .build()
}

/// Run the RTM client until the bridge goes away.
pub async fn run(api: SlackApi, event_tx: mpsc::UnboundedSender<BridgeEvent>) {
    let mut backoff = rtm_backoff();

    loop {
        match connect_once(&api, &event_tx).await {
            Ok(()) => {
                // Clean close; reconnect promptly.
                backoff = rtm_backoff();
            }
            Err(e) => {
                error!(error = %e, "RTM connection failed");
            }
        }

        if event_tx.is_closed() {
            info!("Bridge gone, RTM task exiting");
            return;
        }

        let delay = backoff.next().unwrap_or(Duration::from_secs(60));
        info!("Reconnecting to Slack RTM in {:.1}s", delay.as_secs_f64());
        tokio::time::sleep(delay).await;
    }
}

/// One full session: bootstrap, snapshot handoff, read loop.
async fn connect_once(
    api: &SlackApi,
    event_tx: &mpsc::UnboundedSender<BridgeEvent>,
) -> SlackResult<()> {
    let start = api.rtm_start().await?;
    let url = start
        .url
        .clone()
        .ok_or_else(|| SlackError::Socket("rtm.start returned no socket URL".to_string()))?;

    let (ws, _) = connect_async(url.as_str())
        .await
        .map_err(|e| SlackError::Socket(e.to_string()))?;
    let (mut write, mut read) = ws.split();

    info!("Slack RTM socket connected");
    if event_tx.send(BridgeEvent::SlackSnapshot(Box::new(start))).is_err() {
        return Ok(());
    }

    let mut ping = tokio::time::interval(PING_INTERVAL);
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(payload))) => {
                        dispatch(&payload, event_tx);
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = write.send(Message::Pong(data)).await {
                            return Err(SlackError::Socket(e.to_string()));
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        warn!("Slack RTM socket closed");
                        return Ok(());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(SlackError::Socket(e.to_string())),
                }
            }
            _ = ping.tick() => {
                if let Err(e) = write.send(Message::Ping(Vec::new())).await {
                    return Err(SlackError::Socket(e.to_string()));
                }
            }
        }

        if event_tx.is_closed() {
            return Ok(());
        }
    }
}

/// Parse one RTM frame and forward it. Event types the bridge does not
/// consume fail the tagged-enum parse and are skipped.
fn dispatch(payload: &str, event_tx: &mpsc::UnboundedSender<BridgeEvent>) {
    match serde_json::from_str::<SlackEvent>(payload) {
        Ok(event) => {
            let _ = event_tx.send(BridgeEvent::Slack(event));
        }
        Err(_) => {
            debug!(payload = %payload, "Ignoring unhandled RTM frame");
        }
    }
}
