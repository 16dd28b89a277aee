//! IRC side: connection tasks and the event/action vocabulary.

pub mod client;
pub mod events;

pub use client::{ConnectionSpec, IrcHandle};
pub use events::{IrcAction, IrcEvent};
