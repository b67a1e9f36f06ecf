//! Realtime connection to the tracking server.
//!
//! `transport` moves text frames, `manager` owns the connection lifecycle on
//! top of it, and `session` is what everyone else gets to read.

mod backoff;
mod heartbeat;
mod manager;
#[cfg(test)]
pub(crate) mod memory;
mod session;
mod timers;
mod transport;

pub use backoff::BackoffPolicy;
pub use heartbeat::{Heartbeat, HeartbeatConfig};
pub use manager::{ClientEvent, ConnectionConfig, ConnectionManager, Identity, SendError};
pub use session::{ConnectionStatus, Session};
pub use timers::{TimerKind, TimerSet};
pub use transport::{CloseReason, Connector, Link, LinkEvent, TransportError, WsConnector};
