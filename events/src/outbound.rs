//! Client-to-server event vocabulary.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Packet;
use crate::model::{LatLng, ReactionAction, Role, UserStatus, default_message_type};

/// Upper bound on chat message length, counted in characters.
pub const MAX_MESSAGE_CHARS: usize = 500;

/// Every event this client may emit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum OutboundEvent {
    JoinTracking(JoinTracking),
    LocationUpdate(LocationReport),
    SendMessage(SendMessage),
    TypingStart,
    TypingStop,
    MessageReaction(MessageReaction),
    StatusUpdate(StatusUpdate),
    PresenceUpdate(PresenceUpdate),
    Ping(PingPayload),
}

impl OutboundEvent {
    /// Wire name of this event.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinTracking(_) => "join-tracking",
            Self::LocationUpdate(_) => "location-update",
            Self::SendMessage(_) => "send-message",
            Self::TypingStart => "typing-start",
            Self::TypingStop => "typing-stop",
            Self::MessageReaction(_) => "message-reaction",
            Self::StatusUpdate(_) => "status-update",
            Self::PresenceUpdate(_) => "presence-update",
            Self::Ping(_) => "ping",
        }
    }

    /// Wrap this event in a Socket.IO EVENT packet. Payload-less events carry `{}`.
    #[must_use]
    pub fn to_packet(&self) -> Packet {
        let name = self.name().to_owned();
        let data = match serde_json::to_value(self) {
            Ok(Value::Object(mut tagged)) => tagged.remove("data"),
            _ => None,
        };
        Packet::Event {
            name,
            data: data.unwrap_or_else(|| Value::Object(Map::new())),
        }
    }
}

/// Identity announcement sent once per connected period.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinTracking {
    pub name: String,
    pub role: Role,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<LatLng>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
}

/// Own position fix.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationReport {
    pub location: LatLng,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    pub timestamp: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    pub message: String,
    #[serde(default = "default_message_type")]
    pub message_type: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageReaction {
    pub message_id: String,
    pub emoji: String,
    pub action: ReactionAction,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: UserStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUpdate {
    pub is_active: bool,
    pub last_activity: i64,
}

/// Heartbeat ping; the server echoes it back in `pong`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingPayload {
    pub timestamp: i64,
}

/// Why a chat message was refused before reaching the wire.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    #[error("message is empty")]
    Empty,
    #[error("message is {chars} characters; the limit is {limit}", limit = MAX_MESSAGE_CHARS)]
    TooLong { chars: usize },
}

/// Validate chat text and wrap it as a `send-message` event.
///
/// Surrounding whitespace is trimmed before the length check.
///
/// # Errors
///
/// Returns [`MessageError`] for blank text or text over [`MAX_MESSAGE_CHARS`].
pub fn chat_message(text: &str) -> Result<OutboundEvent, MessageError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(MessageError::Empty);
    }
    let chars = trimmed.chars().count();
    if chars > MAX_MESSAGE_CHARS {
        return Err(MessageError::TooLong { chars });
    }
    Ok(OutboundEvent::SendMessage(SendMessage {
        message: trimmed.to_owned(),
        message_type: default_message_type(),
    }))
}

#[cfg(test)]
#[path = "outbound_test.rs"]
mod tests;
