//! Shared wire model and packet codec for the realtime tracking transport.
//!
//! The tracking server speaks Socket.IO v4 over a raw Engine.IO v4
//! WebSocket. This crate owns the text packet framing for both layers and
//! the closed vocabulary of named events exchanged on top of it, so the
//! connection manager never switches on free-form event strings.

mod inbound;
mod model;
mod outbound;

pub use inbound::{
    ConnectionConfirmed, InboundEvent, LocationBroadcast, Notice, PresenceChange, ReactionUpdate,
    StatusChange, UserCount, UserLeft, UserTyping,
};
pub use model::{
    LatLng, ReactionAction, Role, UserPatch, UserStatus, WireMessage, WireTrailPoint, WireUser,
};
pub use outbound::{
    JoinTracking, LocationReport, MAX_MESSAGE_CHARS, MessageError, MessageReaction, OutboundEvent,
    PingPayload, PresenceUpdate, SendMessage, StatusUpdate, chat_message,
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Error returned while decoding packets or event payloads.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The text frame was empty.
    #[error("empty packet")]
    Empty,
    /// The leading type digit is not a known Engine.IO/Socket.IO packet type.
    #[error("unknown packet type `{0}`")]
    UnknownType(String),
    /// The packet type is valid but not used by this client (acks, binary, upgrades).
    #[error("unsupported packet type `{0}`")]
    Unsupported(String),
    /// The packet targets a namespace other than `/`.
    #[error("unsupported namespace `{0}`")]
    Namespace(String),
    /// The packet body was not valid JSON.
    #[error("invalid packet json: {0}")]
    Json(#[from] serde_json::Error),
    /// An EVENT packet did not carry a `["name", ...]` array.
    #[error("malformed event packet")]
    MalformedEvent,
    /// The event name is not part of the inbound vocabulary.
    #[error("unknown event `{0}`")]
    UnknownEvent(String),
    /// The payload did not match the shape expected for the event.
    #[error("invalid payload for `{event}`: {source}")]
    Payload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Engine.IO open packet body sent by the server right after the upgrade.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    /// Engine.IO session id (distinct from the Socket.IO socket id).
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Server ping interval in milliseconds.
    pub ping_interval: u64,
    /// Server ping timeout in milliseconds.
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

/// One text frame on the wire, flattened across the Engine.IO and Socket.IO layers.
#[derive(Clone, Debug, PartialEq)]
pub enum Packet {
    /// Engine.IO `0`: session open.
    Open(Handshake),
    /// Engine.IO `1`: transport close.
    Close,
    /// Engine.IO `2`: keepalive ping from the server.
    Ping,
    /// Engine.IO `3`: keepalive answer.
    Pong,
    /// Engine.IO `6`: no-op.
    Noop,
    /// Socket.IO `0`: namespace connect. Client side carries auth, server side carries `{"sid"}`.
    Connect(Option<Value>),
    /// Socket.IO `1`: namespace disconnect.
    Disconnect,
    /// Socket.IO `2`: named event with a single payload argument.
    Event { name: String, data: Value },
    /// Socket.IO `4`: namespace connect refused.
    ConnectError(Value),
}

impl Packet {
    /// Socket id carried by a server CONNECT acknowledgement.
    #[must_use]
    pub fn connect_sid(&self) -> Option<&str> {
        match self {
            Self::Connect(Some(payload)) => payload.get("sid").and_then(Value::as_str),
            _ => None,
        }
    }

    /// Human-readable reason from a CONNECT_ERROR payload.
    #[must_use]
    pub fn connect_error_message(&self) -> Option<String> {
        let Self::ConnectError(payload) = self else {
            return None;
        };
        Some(
            payload
                .get("message")
                .and_then(Value::as_str)
                .map_or_else(|| payload.to_string(), ToOwned::to_owned),
        )
    }
}

/// Encode a packet into its text frame.
#[must_use]
pub fn encode_packet(packet: &Packet) -> String {
    match packet {
        Packet::Open(handshake) => {
            let body = serde_json::to_value(handshake).unwrap_or(Value::Null);
            format!("0{body}")
        }
        Packet::Close => "1".to_owned(),
        Packet::Ping => "2".to_owned(),
        Packet::Pong => "3".to_owned(),
        Packet::Noop => "6".to_owned(),
        Packet::Connect(None) => "40".to_owned(),
        Packet::Connect(Some(payload)) => format!("40{payload}"),
        Packet::Disconnect => "41".to_owned(),
        Packet::Event { name, data } => {
            let args = Value::Array(vec![Value::String(name.clone()), data.clone()]);
            format!("42{args}")
        }
        Packet::ConnectError(payload) => format!("44{payload}"),
    }
}

/// Decode one text frame.
///
/// # Errors
///
/// Returns a [`CodecError`] for empty, unknown, unsupported, or malformed frames.
pub fn decode_packet(text: &str) -> Result<Packet, CodecError> {
    let mut chars = text.chars();
    let Some(kind) = chars.next() else {
        return Err(CodecError::Empty);
    };
    let rest = chars.as_str();

    match kind {
        '0' => Ok(Packet::Open(serde_json::from_str(rest)?)),
        '1' => Ok(Packet::Close),
        // Ping payloads only matter for transport upgrades.
        '2' => Ok(Packet::Ping),
        '3' => Ok(Packet::Pong),
        '4' => decode_socket_packet(rest),
        '5' => Err(CodecError::Unsupported("upgrade".to_owned())),
        '6' => Ok(Packet::Noop),
        other => Err(CodecError::UnknownType(other.to_string())),
    }
}

fn decode_socket_packet(text: &str) -> Result<Packet, CodecError> {
    let mut chars = text.chars();
    let Some(kind) = chars.next() else {
        return Err(CodecError::Empty);
    };
    let body = strip_ack_id(strip_namespace(chars.as_str())?);

    match kind {
        '0' => Ok(Packet::Connect(parse_optional_json(body)?)),
        '1' => Ok(Packet::Disconnect),
        '2' => decode_event(body),
        '4' => Ok(Packet::ConnectError(
            parse_optional_json(body)?.unwrap_or(Value::Null),
        )),
        '3' | '5' | '6' => Err(CodecError::Unsupported(format!("4{kind}"))),
        other => Err(CodecError::UnknownType(format!("4{other}"))),
    }
}

fn strip_namespace(body: &str) -> Result<&str, CodecError> {
    if !body.starts_with('/') {
        return Ok(body);
    }
    let (namespace, rest) = body.split_once(',').unwrap_or((body, ""));
    if namespace == "/" {
        Ok(rest)
    } else {
        Err(CodecError::Namespace(namespace.to_owned()))
    }
}

fn strip_ack_id(body: &str) -> &str {
    body.trim_start_matches(|c: char| c.is_ascii_digit())
}

fn parse_optional_json(body: &str) -> Result<Option<Value>, CodecError> {
    if body.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(body)?))
}

fn decode_event(body: &str) -> Result<Packet, CodecError> {
    let Value::Array(mut args) = serde_json::from_str::<Value>(body)? else {
        return Err(CodecError::MalformedEvent);
    };
    if args.is_empty() {
        return Err(CodecError::MalformedEvent);
    }
    let data = if args.len() > 1 {
        args.swap_remove(1)
    } else {
        Value::Object(Map::new())
    };
    let Value::String(name) = args.swap_remove(0) else {
        return Err(CodecError::MalformedEvent);
    };
    Ok(Packet::Event { name, data })
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
