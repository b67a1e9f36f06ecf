//! Tracker configuration parsed from environment variables.

use std::time::Duration;

use crate::map::MapConfig;
use crate::net::{BackoffPolicy, ConnectionConfig, HeartbeatConfig};
use crate::state::DEFAULT_TRAIL_CAPACITY;

pub const DEFAULT_RECONNECT_INITIAL_MS: u64 = 1_000;
pub const DEFAULT_RECONNECT_MAX_MS: u64 = 30_000;
pub const DEFAULT_RECONNECT_MAX_ATTEMPTS: u32 = 10;
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 25;
pub const DEFAULT_HEARTBEAT_TIMEOUT_SECS: u64 = 10;

/// Fatal startup configuration problems.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error("map provider access token is missing; set LIVETRACK_MAP_TOKEN")]
    MissingMapToken,
    #[error("invalid server URL `{0}`: expected an http:// or https:// URL")]
    InvalidServerUrl(String),
    #[error(
        "heartbeat interval must be non-zero and longer than the timeout \
         (interval {interval_secs}s, timeout {timeout_secs}s)"
    )]
    InvalidHeartbeat { interval_secs: u64, timeout_secs: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    /// HTTP(S) base URL of the tracking server.
    pub server_url: String,
    pub map: MapConfig,
    pub connection: ConnectionConfig,
    pub trail_capacity: usize,
}

impl TrackerConfig {
    /// Build typed config from the process environment.
    ///
    /// Required:
    /// - `LIVETRACK_SERVER_URL`
    /// - `LIVETRACK_MAP_TOKEN`
    ///
    /// Optional:
    /// - `LIVETRACK_AUTH_TOKEN`: sent with the Socket.IO connect packet
    /// - `LIVETRACK_RECONNECT_INITIAL_MS`: default 1000
    /// - `LIVETRACK_RECONNECT_MAX_MS`: default 30000
    /// - `LIVETRACK_RECONNECT_MAX_ATTEMPTS`: default 10
    /// - `LIVETRACK_HEARTBEAT_INTERVAL_SECS`: default 25
    /// - `LIVETRACK_HEARTBEAT_TIMEOUT_SECS`: default 10, must be shorter than the interval
    /// - `LIVETRACK_TRAIL_CAPACITY`: default 500
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required value is absent, the server URL is unusable,
    /// or the heartbeat timings cannot detect a dead link.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build typed config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`TrackerConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let server_url = get("LIVETRACK_SERVER_URL")
            .ok_or(ConfigError::MissingVar("LIVETRACK_SERVER_URL"))?
            .trim_end_matches('/')
            .to_owned();
        let access_token = get("LIVETRACK_MAP_TOKEN").ok_or(ConfigError::MissingMapToken)?;

        let mut connection = ConnectionConfig::new(socket_url(&server_url)?);
        connection.auth_token = get("LIVETRACK_AUTH_TOKEN");
        connection.backoff = BackoffPolicy {
            initial: Duration::from_millis(parse_or(
                get("LIVETRACK_RECONNECT_INITIAL_MS"),
                DEFAULT_RECONNECT_INITIAL_MS,
            )),
            max_delay: Duration::from_millis(parse_or(
                get("LIVETRACK_RECONNECT_MAX_MS"),
                DEFAULT_RECONNECT_MAX_MS,
            )),
            max_attempts: parse_or(
                get("LIVETRACK_RECONNECT_MAX_ATTEMPTS"),
                DEFAULT_RECONNECT_MAX_ATTEMPTS,
            ),
            ..BackoffPolicy::default()
        };
        connection.heartbeat = HeartbeatConfig {
            interval: Duration::from_secs(parse_or(
                get("LIVETRACK_HEARTBEAT_INTERVAL_SECS"),
                DEFAULT_HEARTBEAT_INTERVAL_SECS,
            )),
            timeout: Duration::from_secs(parse_or(
                get("LIVETRACK_HEARTBEAT_TIMEOUT_SECS"),
                DEFAULT_HEARTBEAT_TIMEOUT_SECS,
            )),
            ..HeartbeatConfig::default()
        };
        let heartbeat = &connection.heartbeat;
        if heartbeat.interval.is_zero() || heartbeat.timeout >= heartbeat.interval {
            return Err(ConfigError::InvalidHeartbeat {
                interval_secs: heartbeat.interval.as_secs(),
                timeout_secs: heartbeat.timeout.as_secs(),
            });
        }

        Ok(Self {
            server_url,
            map: MapConfig::new(access_token),
            connection,
            trail_capacity: parse_or(get("LIVETRACK_TRAIL_CAPACITY"), DEFAULT_TRAIL_CAPACITY),
        })
    }
}

/// Convert the server's HTTP base URL into its Engine.IO WebSocket endpoint.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidServerUrl`] for anything but http/https.
pub fn socket_url(server_url: &str) -> Result<String, ConfigError> {
    let base = server_url.trim_end_matches('/');
    if let Some(rest) = base.strip_prefix("http://") {
        return Ok(format!("ws://{rest}/socket.io/?EIO=4&transport=websocket"));
    }
    if let Some(rest) = base.strip_prefix("https://") {
        return Ok(format!("wss://{rest}/socket.io/?EIO=4&transport=websocket"));
    }
    Err(ConfigError::InvalidServerUrl(server_url.to_owned()))
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
