use serde::Serialize;

/// Protocol-level events for a client session. Join and part failures
/// surface here, never through the channel collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Server accepted registration (RPL_WELCOME).
    Registered { nickname: String },

    /// Our own nickname changed.
    NickChanged { old_nick: String, new_nick: String },

    /// Server refused a join (full, banned, bad key, ...).
    JoinFailed {
        channel: String,
        code: String,
        reason: String,
    },

    /// Server refused a part, usually because we were not on the channel.
    LeaveFailed {
        channel: String,
        code: String,
        reason: String,
    },

    /// We were kicked from a channel.
    Kicked {
        channel: String,
        by: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// Connection closed. All channels have already been removed.
    Disconnected {
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}
