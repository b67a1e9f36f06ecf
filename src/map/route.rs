//! Local route recording.

use tracing::debug;

use crate::geo::LocationSample;

/// Buffer of the local device's own fixes, filled only while recording.
///
/// Separate from any server-side trail and never sent over the network.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RouteRecorder {
    recording: bool,
    points: Vec<LocationSample>,
}

impl RouteRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a fresh recording; the previous route is discarded.
    pub fn start(&mut self) {
        self.points.clear();
        self.recording = true;
    }

    /// Stop appending. The recorded route is kept for export.
    pub fn stop(&mut self) {
        self.recording = false;
    }

    /// Append a sample while recording. Invalid or older-than-last samples are skipped.
    pub fn record(&mut self, sample: &LocationSample) -> bool {
        if !self.recording || !sample.is_valid() {
            return false;
        }
        if let Some(last) = self.points.last() {
            if sample.timestamp < last.timestamp {
                debug!(timestamp = sample.timestamp, last = last.timestamp, "skipping stale route sample");
                return false;
            }
        }
        self.points.push(sample.clone());
        true
    }

    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    #[must_use]
    pub fn points(&self) -> &[LocationSample] {
        &self.points
    }

    pub fn clear(&mut self) {
        self.recording = false;
        self.points.clear();
    }
}
