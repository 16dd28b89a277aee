//! Event and action types decoupling the bridge from the IRC wire library.
//!
//! Connection tasks translate `irc::proto` traffic into [`IrcEvent`]s and
//! apply [`IrcAction`]s; the bridge never sees the library types.

/// What a connection task reports to the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrcEvent {
    /// Registration with the server completed (RPL_WELCOME).
    Registered,
    Message {
        from: String,
        to: String,
        text: String,
    },
    Notice {
        from: String,
        to: String,
        text: String,
    },
    /// CTCP ACTION ("/me").
    Action {
        from: String,
        to: String,
        text: String,
    },
    Invite {
        channel: String,
    },
    Kick {
        channel: String,
        nick: String,
        by: String,
        reason: Option<String>,
    },
    Join {
        nick: String,
        channel: String,
    },
    Part {
        nick: String,
        channel: String,
    },
    Quit {
        nick: String,
        reason: Option<String>,
    },
    NickChange {
        old: String,
        new: String,
    },
    /// Complete name list for a channel (aggregated through ENDOFNAMES).
    Names {
        channel: String,
        nicks: Vec<String>,
    },
    Topic {
        channel: String,
        topic: Option<String>,
    },
    /// The server rejected our nickname (numeric 432).
    NickInvalid,
    /// The connection is gone and retries are exhausted.
    Abort,
}

/// What the bridge asks a connection task to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrcAction {
    Privmsg {
        target: String,
        text: String,
    },
    /// CTCP ACTION ("/me").
    Action {
        target: String,
        text: String,
    },
    Join {
        channel: String,
        key: Option<String>,
    },
    Nick(String),
    /// A raw command tuple from `auto_send_commands`.
    Raw(Vec<String>),
    /// Disconnect with a quit reason and end the task.
    Quit(String),
}
