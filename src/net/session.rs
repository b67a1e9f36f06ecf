//! Connection snapshot published to readers.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl ConnectionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a status badge needs. Only the connection driver writes it.
///
/// `status == Connected` exactly when `socket_id` is set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub socket_id: Option<String>,
    pub status: ConnectionStatus,
    pub reconnect_attempts: u32,
    pub latency: Option<Duration>,
    /// Delay before the scheduled reconnect, while one is pending.
    pub next_retry_in: Option<Duration>,
    pub last_error: Option<String>,
    /// Automatic retries gave up; only a manual `connect()` leaves this state.
    pub terminal: bool,
    /// Transport attempts made so far; tags every dispatched event.
    pub epoch: u64,
}

impl Session {
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// One-line status for display.
    #[must_use]
    pub fn badge(&self) -> String {
        match self.status {
            ConnectionStatus::Connected => match self.latency {
                Some(latency) => format!("connected ({} ms)", latency.as_millis()),
                None => "connected".to_owned(),
            },
            ConnectionStatus::Connecting => "connecting...".to_owned(),
            ConnectionStatus::Reconnecting => match self.next_retry_in {
                Some(delay) => format!(
                    "reconnecting (attempt {}, retry in {:.1}s)",
                    self.reconnect_attempts,
                    delay.as_secs_f64()
                ),
                None => format!("reconnecting (attempt {})", self.reconnect_attempts),
            },
            ConnectionStatus::Disconnected => match (&self.last_error, self.terminal) {
                (Some(error), true) => format!("disconnected: {error}"),
                _ => "disconnected".to_owned(),
            },
        }
    }
}
