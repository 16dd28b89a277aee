//! IRC connection task.
//!
//! Each IRC presence (the bot and every shadow) runs one of these tasks: a
//! connect-with-retries loop around a select between the server stream and
//! the bridge's action channel. Wire messages are translated into
//! [`IrcEvent`]s; the task ends on a `Quit` action or when its retry budget
//! is exhausted (which reports `Abort`).

use std::collections::HashMap;
use std::time::Duration;

use backon::BackoffBuilder;
use futures::StreamExt;
use irc::client::prelude::{Client, Config as ClientConfig};
use irc::proto::{Command, Message, Response};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::common::error::{IrcError, IrcResult};
use crate::common::messages::{BridgeEvent, IrcSource};
use crate::irc::events::{IrcAction, IrcEvent};

/// Connect attempts for the bot connection.
pub const BOT_CONNECT_ATTEMPTS: usize = 10;

/// Connect attempts for a shadow connection.
pub const SHADOW_CONNECT_ATTEMPTS: usize = 5;

/// Flood protection: at most 2 messages per 1 s window (500 ms pacing).
const FLOOD_MAX_BURST: u32 = 2;
const FLOOD_WINDOW_SECS: u32 = 1;

/// Everything needed to open one IRC connection.
#[derive(Debug, Clone)]
pub struct ConnectionSpec {
    pub server: String,
    pub port: Option<u16>,
    pub use_tls: Option<bool>,
    pub nickname: String,
    pub username: Option<String>,
    pub realname: Option<String>,
    pub max_attempts: usize,
}

/// Bridge-side handle to a connection task.
#[derive(Debug, Clone)]
pub struct IrcHandle {
    actions: mpsc::UnboundedSender<IrcAction>,
}

impl IrcHandle {
    /// Hand an action to the connection task. Returns false when the task
    /// is already gone.
    pub fn send(&self, action: IrcAction) -> bool {
        self.actions.send(action).is_ok()
    }
}

/// Handle backed by a bare channel, for exercising bridge logic in tests.
#[cfg(test)]
pub fn test_handle() -> (IrcHandle, mpsc::UnboundedReceiver<IrcAction>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (IrcHandle { actions: tx }, rx)
}

/// Spawn a connection task; events arrive at `event_tx` tagged with
/// `source`.
pub fn spawn(
    spec: ConnectionSpec,
    source: IrcSource,
    event_tx: mpsc::UnboundedSender<BridgeEvent>,
) -> IrcHandle {
    let (action_tx, action_rx) = mpsc::unbounded_channel();
    tokio::spawn(run(spec, source, action_rx, event_tx));
    IrcHandle { actions: action_tx }
}

fn connect_backoff() -> impl Iterator<Item = Duration> {
    backon::ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(2))
        .with_max_delay(Duration::from_secs(60))
        .with_jitter()
        .without_max_times()
        .build()
}

fn client_config(spec: &ConnectionSpec) -> ClientConfig {
    ClientConfig {
        nickname: Some(spec.nickname.clone()),
        username: spec.username.clone(),
        realname: spec.realname.clone(),
        server: Some(spec.server.clone()),
        port: spec.port,
        use_tls: spec.use_tls,
        max_messages_in_burst: Some(FLOOD_MAX_BURST),
        burst_window_length: Some(FLOOD_WINDOW_SECS),
        ..ClientConfig::default()
    }
}

/// How one connected session ended.
enum SessionEnd {
    /// Graceful quit; the task is done.
    Quit,
    /// The server link dropped. `registered` says whether we got far
    /// enough to count this as a successful attempt.
    Dropped { registered: bool },
}

async fn run(
    spec: ConnectionSpec,
    source: IrcSource,
    mut actions: mpsc::UnboundedReceiver<IrcAction>,
    event_tx: mpsc::UnboundedSender<BridgeEvent>,
) {
    let mut backoff = connect_backoff();
    let mut attempts = 0usize;

    loop {
        attempts += 1;
        match session(&spec, &source, &mut actions, &event_tx).await {
            Ok(SessionEnd::Quit) => {
                debug!(nick = %spec.nickname, "IRC connection closed on request");
                return;
            }
            Ok(SessionEnd::Dropped { registered }) => {
                warn!(nick = %spec.nickname, "IRC connection dropped");
                if registered {
                    attempts = 0;
                    backoff = connect_backoff();
                }
            }
            Err(e) => {
                warn!(nick = %spec.nickname, error = %e, "IRC connect failed");
            }
        }

        if event_tx.is_closed() {
            return;
        }

        if attempts >= spec.max_attempts {
            let err = IrcError::RetriesExhausted {
                nick: spec.nickname.clone(),
            };
            info!(error = %err, attempts, "Giving up on IRC connection");
            let _ = event_tx.send(BridgeEvent::Irc {
                source,
                event: IrcEvent::Abort,
            });
            return;
        }

        let delay = backoff.next().unwrap_or(Duration::from_secs(60));
        tokio::time::sleep(delay).await;
    }
}

/// One connected session: register, then pump the stream and the action
/// channel until either side ends.
async fn session(
    spec: &ConnectionSpec,
    source: &IrcSource,
    actions: &mut mpsc::UnboundedReceiver<IrcAction>,
    event_tx: &mpsc::UnboundedSender<BridgeEvent>,
) -> IrcResult<SessionEnd> {
    let mut client = Client::from_config(client_config(spec)).await?;
    client.identify()?;
    let mut stream = client.stream()?;
    let sender = client.sender();

    // NAMES replies span several lines; collect until ENDOFNAMES.
    let mut pending_names: HashMap<String, Vec<String>> = HashMap::new();
    let mut registered = false;

    loop {
        tokio::select! {
            message = stream.next() => {
                match message {
                    Some(Ok(message)) => {
                        if let Some(event) = translate(&message, &mut pending_names) {
                            if event == IrcEvent::Registered {
                                registered = true;
                            }
                            if event_tx
                                .send(BridgeEvent::Irc { source: source.clone(), event })
                                .is_err()
                            {
                                return Ok(SessionEnd::Quit);
                            }
                        }
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "IRC stream error");
                        return Ok(SessionEnd::Dropped { registered });
                    }
                    None => return Ok(SessionEnd::Dropped { registered }),
                }
            }
            action = actions.recv() => {
                match action {
                    Some(IrcAction::Quit(reason)) => {
                        let _ = sender.send(Command::QUIT(Some(reason)));
                        return Ok(SessionEnd::Quit);
                    }
                    Some(action) => apply(&sender, action)?,
                    // Bridge dropped the handle; disconnect quietly.
                    None => {
                        let _ = sender.send(Command::QUIT(None));
                        return Ok(SessionEnd::Quit);
                    }
                }
            }
        }
    }
}

fn apply(sender: &irc::client::Sender, action: IrcAction) -> IrcResult<()> {
    match action {
        IrcAction::Privmsg { target, text } => sender.send_privmsg(target, text)?,
        IrcAction::Action { target, text } => {
            sender.send_privmsg(target, format!("\u{1}ACTION {}\u{1}", text))?
        }
        IrcAction::Join { channel, key } => {
            sender.send(Command::JOIN(channel, key, None))?
        }
        IrcAction::Nick(nick) => sender.send(Command::NICK(nick))?,
        IrcAction::Raw(parts) => {
            if let Some((command, args)) = parts.split_first() {
                sender.send(Command::Raw(
                    command.clone(),
                    args.to_vec(),
                ))?;
            }
        }
        IrcAction::Quit(_) => unreachable!("handled by the session loop"),
    }
    Ok(())
}

/// Map a wire message onto the bridge's event vocabulary. Returns `None`
/// for traffic the bridge does not consume.
fn translate(
    message: &Message,
    pending_names: &mut HashMap<String, Vec<String>>,
) -> Option<IrcEvent> {
    let from = message.source_nickname().unwrap_or("").to_string();

    match &message.command {
        Command::PRIVMSG(target, text) => {
            let event = match strip_ctcp_action(text) {
                Some(action_text) => IrcEvent::Action {
                    from,
                    to: target.clone(),
                    text: action_text.to_string(),
                },
                None => IrcEvent::Message {
                    from,
                    to: target.clone(),
                    text: text.clone(),
                },
            };
            Some(event)
        }
        Command::NOTICE(target, text) => Some(IrcEvent::Notice {
            from,
            to: target.clone(),
            text: text.clone(),
        }),
        Command::INVITE(_, channel) => Some(IrcEvent::Invite {
            channel: channel.clone(),
        }),
        Command::KICK(channels, users, reason) => {
            // Comma lists are rare; report the first pair.
            let channel = channels.split(',').next().unwrap_or_default().to_string();
            let nick = users.split(',').next().unwrap_or_default().to_string();
            Some(IrcEvent::Kick {
                channel,
                nick,
                by: from,
                reason: reason.clone(),
            })
        }
        Command::JOIN(channel, _, _) => Some(IrcEvent::Join {
            nick: from,
            channel: channel.clone(),
        }),
        Command::PART(channel, _) => Some(IrcEvent::Part {
            nick: from,
            channel: channel.clone(),
        }),
        Command::QUIT(reason) => Some(IrcEvent::Quit {
            nick: from,
            reason: reason.clone(),
        }),
        Command::NICK(new_nick) => Some(IrcEvent::NickChange {
            old: from,
            new: new_nick.clone(),
        }),
        Command::TOPIC(channel, topic) => Some(IrcEvent::Topic {
            channel: channel.clone(),
            topic: topic.clone(),
        }),
        Command::Response(Response::RPL_WELCOME, _) => Some(IrcEvent::Registered),
        Command::Response(Response::RPL_TOPIC, args) => {
            let channel = args.get(1)?.clone();
            let topic = args.get(2).cloned();
            Some(IrcEvent::Topic { channel, topic })
        }
        Command::Response(Response::RPL_NAMREPLY, args) => {
            // args: [client, symbol, channel, names]
            let channel = args.get(2)?.clone();
            let names = args.last()?;
            pending_names.entry(channel).or_default().extend(
                names
                    .split_whitespace()
                    .map(|n| n.trim_start_matches(['@', '+', '%', '&', '~']).to_string()),
            );
            None
        }
        Command::Response(Response::RPL_ENDOFNAMES, args) => {
            let channel = args.get(1)?.clone();
            let nicks = pending_names.remove(&channel).unwrap_or_default();
            Some(IrcEvent::Names { channel, nicks })
        }
        Command::Response(Response::ERR_ERRONEOUSNICKNAME, _) => Some(IrcEvent::NickInvalid),
        _ => None,
    }
}

/// Extract the payload of a CTCP ACTION, if this is one.
fn strip_ctcp_action(text: &str) -> Option<&str> {
    text.strip_prefix("\u{1}ACTION ")
        .map(|rest| rest.strip_suffix('\u{1}').unwrap_or(rest))
}
