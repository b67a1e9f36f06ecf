//! Live presence and location-tracking client core.
//!
//! SYSTEM CONTEXT
//! ==============
//! A field device samples its own position, streams it to the tracking
//! server over a persistent Socket.IO connection, and renders every other
//! participant as a map marker with a trail. Chat, typing indicators, and
//! reactions ride the same connection.
//!
//! DATA FLOW
//! =========
//! `geo` (position fixes) -> `net` (outbound events, inbound event stream)
//! -> `state` (roster, transcript, typing) -> `map` (markers, trails, export).
//!
//! Each stage owns its state exclusively; downstream stages read snapshots and
//! hand intents back upstream as typed events.

pub mod config;
pub mod geo;
pub mod map;
pub mod net;
pub mod state;

pub use events;

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch, saturating to 0 on clock skew.
pub(crate) fn now_ms() -> i64 {
    let Ok(duration) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(duration.as_millis()).unwrap_or(0)
}
