//! doppel - Slack-IRC bridge with per-user shadow clients.
//!
//! Relays messages both ways between a Slack workspace and one IRC network.
//! Every active Slack user gets their own IRC connection (a "shadow"), so
//! IRC participants see real nicks instead of a single relay bot; IRC
//! traffic is posted back into Slack under the IRC author's name.

mod bridge;
mod common;
mod config;
mod irc;
mod slack;
mod text;

use anyhow::Result;
use tracing::{error, info};

use bridge::{Bridge, ChannelBundle, ShadowConnector};
use common::messages::{ExitReason, IrcSource};
use config::{get_config_path, load_and_validate};
use crate::irc::client::{
    spawn as spawn_irc, ConnectionSpec, BOT_CONNECT_ATTEMPTS, SHADOW_CONNECT_ATTEMPTS,
};
use slack::{api, SlackApi};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = get_config_path();
    let config = match load_and_validate(&config_path) {
        Ok(config) => config,
        Err(e) => {
            init_logging(None);
            error!("Failed to load configuration from {}: {}", config_path, e);
            error!("See doppel.conf.example for reference.");
            return Err(common::AppError::Config(e).into());
        }
    };
    init_logging(config.loglevel.as_deref());

    info!("doppel v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("  IRC server: {}", config.irc.server);
    info!("  Bot nick: {}", config.irc.nickname);
    info!("  Mapped channels: {}", config.bridge.channel_mapping.len());

    let channels = ChannelBundle::new();

    // ============================================================
    // IRC bot connection
    // ============================================================
    let bot_handle = spawn_irc(
        ConnectionSpec {
            server: config.irc.server.clone(),
            port: config.irc.options.port,
            use_tls: config.irc.options.use_tls,
            nickname: config.irc.nickname.clone(),
            username: Some(config.irc.nickname.clone()),
            realname: config.irc.options.realname.clone(),
            max_attempts: BOT_CONNECT_ATTEMPTS,
        },
        IrcSource::Bot,
        channels.event_tx.clone(),
    );

    // Shadow connections are spawned on demand by the bridge.
    let connector: ShadowConnector = {
        let irc_config = config.irc.clone();
        let event_tx = channels.event_tx.clone();
        Box::new(move |user_id, slack_name, nick| {
            spawn_irc(
                ConnectionSpec {
                    server: irc_config.server.clone(),
                    port: irc_config.options.port,
                    use_tls: irc_config.options.use_tls,
                    nickname: nick.to_string(),
                    username: Some(slack_name.to_string()),
                    realname: Some(slack_name.to_string()),
                    max_attempts: SHADOW_CONNECT_ATTEMPTS,
                },
                IrcSource::Shadow(user_id.to_string()),
                event_tx.clone(),
            )
        })
    };

    // ============================================================
    // Slack tasks
    // ============================================================
    let slack_api = SlackApi::new(config.slack.token.clone());
    tokio::spawn(api::run_outbound_loop(slack_api.clone(), channels.slack_rx));
    tokio::spawn(slack::rtm::run(slack_api, channels.event_tx.clone()));

    // ============================================================
    // Bridge actor
    // ============================================================
    let bridge = Bridge::new(
        &config,
        bot_handle,
        connector,
        channels.event_tx.clone(),
        channels.slack_tx.clone(),
    )?;
    let mut bridge_task = tokio::spawn(bridge.run(channels.event_rx));

    tokio::select! {
        biased;
        _ = wait_for_signal() => {
            info!("Shutdown signal received - exiting");
            Ok(())
        }
        result = &mut bridge_task => {
            match result {
                Ok(ExitReason::BotAborted) => {
                    error!("IRC bot connection lost for good - exiting");
                    std::process::exit(1);
                }
                Ok(ExitReason::Shutdown) => {
                    info!("Bridge stopped");
                    Ok(())
                }
                Err(e) => {
                    error!("Bridge task panicked: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}

/// Install the tracing subscriber. `RUST_LOG` wins over the config value.
fn init_logging(loglevel: Option<&str>) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(loglevel.unwrap_or("info")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Resolves once the process is asked to stop (interrupt, or SIGTERM on
/// unix).
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("SIGTERM stream should install");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Interrupt received"),
            _ = sigterm.recv() => info!("SIGTERM received"),
        }
    }

    #[cfg(not(unix))]
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Interrupt received");
    }
}
