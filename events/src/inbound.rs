//! Server-to-client event vocabulary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::CodecError;
use crate::model::{LatLng, ReactionAction, UserPatch, UserStatus, WireMessage, WireUser};

/// Every event the tracking server may push to a client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum InboundEvent {
    /// Full roster snapshot.
    UsersList(Vec<WireUser>),
    UserJoined(WireUser),
    UserLeft(UserLeft),
    UserUpdated(UserPatch),
    UserCount(UserCount),
    UserTyping(UserTyping),
    LocationUpdate(LocationBroadcast),
    NewMessage(WireMessage),
    MessageReactionUpdate(ReactionUpdate),
    UserStatusChanged(StatusChange),
    UserPresenceChanged(PresenceChange),
    /// Heartbeat reply echoing the ping timestamp.
    Pong(crate::PingPayload),
    ConnectionConfirmed(ConnectionConfirmed),
    ServerShutdown(Notice),
    Error(Notice),
}

impl InboundEvent {
    /// Wire names of every inbound event, in declaration order.
    pub const NAMES: [&'static str; 15] = [
        "users-list",
        "user-joined",
        "user-left",
        "user-updated",
        "user-count",
        "user-typing",
        "location-update",
        "new-message",
        "message-reaction-update",
        "user-status-changed",
        "user-presence-changed",
        "pong",
        "connection-confirmed",
        "server-shutdown",
        "error",
    ];

    /// Build a typed event from a wire name and its payload.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnknownEvent`] for names outside the vocabulary and
    /// [`CodecError::Payload`] when the payload does not match the event's shape.
    pub fn decode(name: &str, data: Value) -> Result<Self, CodecError> {
        if !Self::NAMES.contains(&name) {
            return Err(CodecError::UnknownEvent(name.to_owned()));
        }
        let tagged = serde_json::json!({ "event": name, "data": data });
        serde_json::from_value(tagged).map_err(|source| CodecError::Payload {
            event: name.to_owned(),
            source,
        })
    }

    /// Wire name of this event.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::UsersList(_) => "users-list",
            Self::UserJoined(_) => "user-joined",
            Self::UserLeft(_) => "user-left",
            Self::UserUpdated(_) => "user-updated",
            Self::UserCount(_) => "user-count",
            Self::UserTyping(_) => "user-typing",
            Self::LocationUpdate(_) => "location-update",
            Self::NewMessage(_) => "new-message",
            Self::MessageReactionUpdate(_) => "message-reaction-update",
            Self::UserStatusChanged(_) => "user-status-changed",
            Self::UserPresenceChanged(_) => "user-presence-changed",
            Self::Pong(_) => "pong",
            Self::ConnectionConfirmed(_) => "connection-confirmed",
            Self::ServerShutdown(_) => "server-shutdown",
            Self::Error(_) => "error",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLeft {
    pub user_id: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCount {
    pub count: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTyping {
    pub user_id: String,
    #[serde(default)]
    pub user_name: Option<String>,
    pub is_typing: bool,
}

/// A peer's position fix relayed by the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationBroadcast {
    pub user_id: String,
    pub location: LatLng,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub heading: Option<f64>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionUpdate {
    pub message_id: String,
    pub emoji: String,
    pub user_id: String,
    pub action: ReactionAction,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub user_id: String,
    pub status: UserStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceChange {
    pub user_id: String,
    pub is_active: bool,
    #[serde(default)]
    pub last_activity: Option<i64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfirmed {
    #[serde(default)]
    pub socket_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Free-text notice attached to `server-shutdown` and `error`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub message: String,
}

#[cfg(test)]
#[path = "inbound_test.rs"]
mod tests;
