//! Slack side: Web API client, RTM socket task, wire types and the
//! workspace data store.

pub mod api;
pub mod events;
pub mod rtm;
pub mod store;

pub use api::SlackApi;
pub use store::{Conversation, SlackStore};
