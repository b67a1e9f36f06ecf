//! Contract of the platform positioning API.

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;

use super::LocationSample;

/// Acquisition parameters for a continuous watch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WatchOptions {
    pub high_accuracy: bool,
    /// Longest wait for a single fix before the platform reports a timeout.
    pub timeout: Duration,
    /// Oldest cached fix the platform may hand back.
    pub max_age: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_secs(10),
            max_age: Duration::from_secs(5),
        }
    }
}

/// Platform handle identifying one registered watch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

/// What the platform reports for a watch.
#[derive(Clone, Debug, PartialEq)]
pub enum PositionUpdate {
    Fix(LocationSample),
    /// Platform error code and its message (1 denied, 2 unavailable, 3 timeout).
    Failed { code: u16, message: String },
}

/// A registered watch and the stream of updates it produces.
pub struct PositionWatch {
    pub id: WatchId,
    pub updates: mpsc::UnboundedReceiver<PositionUpdate>,
}

/// The device positioning API.
pub trait PositionSource: Send + Sync {
    /// Register a continuous watch.
    ///
    /// # Errors
    ///
    /// Returns a [`GeolocationError`] when positioning is unavailable on this platform.
    fn watch(&self, options: &WatchOptions) -> Result<PositionWatch, GeolocationError>;

    /// Deregister a watch. Must tolerate ids that already ended.
    fn clear_watch(&self, id: WatchId);
}

/// Closed taxonomy of acquisition failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeolocationErrorKind {
    PermissionDenied,
    PositionUnavailable,
    Timeout,
    Unknown,
}

impl GeolocationErrorKind {
    /// Map a platform error code.
    #[must_use]
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => Self::PermissionDenied,
            2 => Self::PositionUnavailable,
            3 => Self::Timeout,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission_denied",
            Self::PositionUnavailable => "position_unavailable",
            Self::Timeout => "timeout",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for GeolocationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct GeolocationError {
    pub kind: GeolocationErrorKind,
    pub message: String,
}

impl GeolocationError {
    #[must_use]
    pub fn new(kind: GeolocationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Build from a platform error code, substituting a readable message when the platform gave none.
    #[must_use]
    pub fn from_code(code: u16, message: &str) -> Self {
        let kind = GeolocationErrorKind::from_code(code);
        let message = if message.trim().is_empty() {
            match kind {
                GeolocationErrorKind::PermissionDenied => "location permission was denied",
                GeolocationErrorKind::PositionUnavailable => "location information is unavailable",
                GeolocationErrorKind::Timeout => "timed out waiting for a location fix",
                GeolocationErrorKind::Unknown => "an unknown location error occurred",
            }
            .to_owned()
        } else {
            message.to_owned()
        };
        Self { kind, message }
    }
}
