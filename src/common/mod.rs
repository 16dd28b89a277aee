//! Shared types used across the application.

pub mod error;
pub mod messages;

pub use error::{AppError, ConfigError, IrcError, SlackError};
pub use messages::{BridgeEvent, ExitReason, IrcSource, SlackOutbound};
