//! Continuous position watch with a published latest fix.
//!
//! DESIGN
//! ======
//! At most one watch is registered at a time. A forwarding task drains the
//! source's update stream into a `watch` channel, so readers always see the
//! most recent accepted fix and nothing older. The platform registration is
//! released exactly once, whichever of `stop`, restart, drop, or a platform
//! error gets there first.
//!
//! ERROR HANDLING
//! ==============
//! A platform error is mapped to [`GeolocationErrorKind`](super::GeolocationErrorKind),
//! published in [`SamplerState::error`], and ends the watch. Nothing more is
//! emitted until `start` is called again. Fixes with unusable coordinates are
//! logged and dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{
    GeolocationError, LocationSample, PositionSource, PositionUpdate, PositionWatch, WatchId,
    WatchOptions,
};

/// Snapshot published to readers of the sampler.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SamplerState {
    pub sample: Option<LocationSample>,
    pub error: Option<GeolocationError>,
    pub watching: bool,
}

struct Registration {
    source: Arc<dyn PositionSource>,
    id: WatchId,
    released: AtomicBool,
}

impl Registration {
    fn release(&self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            debug!(watch_id = self.id.0, "clearing position watch");
            self.source.clear_watch(self.id);
        }
    }
}

struct ActiveWatch {
    registration: Arc<Registration>,
    task: JoinHandle<()>,
}

pub struct GeolocationSampler {
    source: Arc<dyn PositionSource>,
    state: Arc<watch::Sender<SamplerState>>,
    active: Option<ActiveWatch>,
}

impl GeolocationSampler {
    #[must_use]
    pub fn new(source: Arc<dyn PositionSource>) -> Self {
        let (state, _) = watch::channel(SamplerState::default());
        Self {
            source,
            state: Arc::new(state),
            active: None,
        }
    }

    /// Register a continuous watch, replacing any watch already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, options: WatchOptions) -> watch::Receiver<SamplerState> {
        self.stop();

        match self.source.watch(&options) {
            Ok(PositionWatch { id, updates }) => {
                info!(watch_id = id.0, high_accuracy = options.high_accuracy, "position watch started");
                let registration = Arc::new(Registration {
                    source: Arc::clone(&self.source),
                    id,
                    released: AtomicBool::new(false),
                });
                self.state.send_modify(|state| {
                    state.error = None;
                    state.watching = true;
                });
                let task = tokio::spawn(run_watch(
                    updates,
                    Arc::clone(&self.state),
                    Arc::clone(&registration),
                ));
                self.active = Some(ActiveWatch { registration, task });
            }
            Err(error) => {
                warn!(kind = %error.kind, message = %error.message, "position watch could not start");
                self.state.send_modify(|state| {
                    state.error = Some(error);
                    state.watching = false;
                });
            }
        }

        self.state.subscribe()
    }

    /// Deregister the current watch. Safe to call repeatedly.
    pub fn stop(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        active.task.abort();
        active.registration.release();
        self.state.send_modify(|state| state.watching = false);
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SamplerState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn state(&self) -> SamplerState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn latest(&self) -> Option<LocationSample> {
        self.state.borrow().sample.clone()
    }

    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.state.borrow().watching
    }
}

impl Drop for GeolocationSampler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_watch(
    mut updates: mpsc::UnboundedReceiver<PositionUpdate>,
    state: Arc<watch::Sender<SamplerState>>,
    registration: Arc<Registration>,
) {
    while let Some(update) = updates.recv().await {
        match update {
            PositionUpdate::Fix(sample) => {
                if !sample.is_valid() {
                    warn!(
                        latitude = sample.latitude,
                        longitude = sample.longitude,
                        "dropping position fix with invalid coordinates"
                    );
                    continue;
                }
                state.send_modify(|state| {
                    state.sample = Some(sample);
                    state.error = None;
                });
            }
            PositionUpdate::Failed { code, message } => {
                let error = GeolocationError::from_code(code, &message);
                warn!(kind = %error.kind, message = %error.message, "position watch failed");
                registration.release();
                state.send_modify(|state| {
                    state.error = Some(error);
                    state.watching = false;
                });
                return;
            }
        }
    }

    debug!(watch_id = registration.id.0, "position source ended the watch");
    registration.release();
    state.send_modify(|state| state.watching = false);
}

#[cfg(test)]
#[path = "sampler_test.rs"]
mod tests;
