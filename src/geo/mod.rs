//! Device position sampling.
//!
//! The platform positioning API is an external collaborator reached through
//! [`PositionSource`]. [`GeolocationSampler`] owns one continuous watch on
//! that source and publishes the latest accepted fix.

mod sampler;
mod simulated;
mod source;

pub use sampler::{GeolocationSampler, SamplerState};
pub use simulated::{SimulatedSource, offset};
pub use source::{
    GeolocationError, GeolocationErrorKind, PositionSource, PositionUpdate, PositionWatch,
    WatchId, WatchOptions,
};

use events::{LatLng, LocationReport};
use serde::{Deserialize, Serialize};

/// One accepted position fix.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy radius in meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    /// Degrees clockwise from true north.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    /// Meters per second.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl LocationSample {
    #[must_use]
    pub fn new(latitude: f64, longitude: f64, timestamp: i64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: None,
            heading: None,
            speed: None,
            timestamp,
        }
    }

    #[must_use]
    pub fn lat_lng(&self) -> LatLng {
        LatLng::new(self.latitude, self.longitude)
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lat_lng().is_valid()
    }

    /// Outbound `location-update` payload for this fix.
    #[must_use]
    pub fn to_report(&self) -> LocationReport {
        LocationReport {
            location: self.lat_lng(),
            accuracy: self.accuracy,
            speed: self.speed,
            heading: self.heading,
            timestamp: self.timestamp,
        }
    }
}
