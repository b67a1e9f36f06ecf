//! A `PositionSource` that walks a straight line at constant speed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use events::LatLng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{
    GeolocationError, GeolocationErrorKind, LocationSample, PositionSource, PositionUpdate,
    PositionWatch, WatchId, WatchOptions,
};

const EARTH_RADIUS_M: f64 = 6_371_000.0;

pub struct SimulatedSource {
    origin: LatLng,
    /// Degrees clockwise from north.
    bearing: f64,
    /// Meters per second.
    speed: f64,
    period: Duration,
    next_id: AtomicU64,
    tasks: Mutex<HashMap<WatchId, JoinHandle<()>>>,
}

impl SimulatedSource {
    #[must_use]
    pub fn new(origin: LatLng, bearing: f64, speed: f64, period: Duration) -> Self {
        Self {
            origin,
            bearing,
            speed,
            period: period.max(Duration::from_millis(1)),
            next_id: AtomicU64::new(0),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Number of watches still registered.
    #[must_use]
    pub fn active_watches(&self) -> usize {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl PositionSource for SimulatedSource {
    fn watch(&self, options: &WatchOptions) -> Result<PositionWatch, GeolocationError> {
        if !self.origin.is_valid() {
            return Err(GeolocationError::new(
                GeolocationErrorKind::PositionUnavailable,
                "simulated origin is not a valid coordinate",
            ));
        }

        let id = WatchId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let (tx, rx) = mpsc::unbounded_channel();
        let (origin, bearing, speed, period) = (self.origin, self.bearing, self.speed, self.period);
        let accuracy = if options.high_accuracy { 5.0 } else { 50.0 };

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut step: u32 = 0;
            loop {
                ticker.tick().await;
                let position = offset(origin, bearing, speed * period.as_secs_f64() * f64::from(step));
                let sample = LocationSample {
                    accuracy: Some(accuracy),
                    heading: Some(bearing),
                    speed: Some(speed),
                    ..LocationSample::new(position.latitude, position.longitude, crate::now_ms())
                };
                if tx.send(PositionUpdate::Fix(sample)).is_err() {
                    break;
                }
                step = step.saturating_add(1);
            }
        });

        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, task);
        Ok(PositionWatch { id, updates: rx })
    }

    fn clear_watch(&self, id: WatchId) {
        let task = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        if let Some(task) = task {
            task.abort();
        }
    }
}

impl Drop for SimulatedSource {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, task) in tasks.drain() {
            task.abort();
        }
    }
}

/// Point `distance` meters from `origin` along `bearing` degrees.
///
/// Equirectangular approximation; accurate enough over the short legs a
/// simulated walk covers.
#[must_use]
pub fn offset(origin: LatLng, bearing: f64, distance: f64) -> LatLng {
    let theta = bearing.to_radians();
    let d_lat = distance * theta.cos() / EARTH_RADIUS_M;
    let d_lng = distance * theta.sin() / (EARTH_RADIUS_M * origin.latitude.to_radians().cos());
    LatLng::new(
        (origin.latitude + d_lat.to_degrees()).clamp(-90.0, 90.0),
        wrap_longitude(origin.longitude + d_lng.to_degrees()),
    )
}

fn wrap_longitude(longitude: f64) -> f64 {
    if (-180.0..=180.0).contains(&longitude) {
        longitude
    } else {
        (longitude + 180.0).rem_euclid(360.0) - 180.0
    }
}

#[cfg(test)]
#[path = "simulated_test.rs"]
mod tests;
