//! Marker and trail reconciliation against the roster.
//!
//! DESIGN
//! ======
//! `LiveMap` remembers what it has placed on the surface per user id. Each
//! `sync` walks the roster once:
//!
//! - unseen id with a location: add the marker
//! - known id whose position changed: move the marker
//! - known id whose name, role, or status changed: refresh the popup
//! - trail with two or more points: add the layer once, then update geometry
//! - trail shrunk below two points: remove the layer and its source
//! - id no longer in the roster: remove marker, popup, layer, and source
//!
//! ERROR HANDLING
//! ==============
//! A blank map token fails construction. Anything wrong with a single user
//! (bad coordinates) is logged and that user is skipped for this pass.

use std::collections::BTreeMap;

use events::{MessageError, OutboundEvent};
use tracing::{debug, warn};

use super::route::RouteRecorder;
use super::surface::{LngLat, MapSurface, MarkerPopup};
use super::MapConfig;
use crate::config::ConfigError;
use crate::geo::LocationSample;
use crate::state::{Roster, Trail, User};

#[derive(Clone, Debug, PartialEq)]
struct PlacedMarker {
    at: LngLat,
    popup: MarkerPopup,
}

/// Identity of the trail geometry last pushed to the surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct TrailShape {
    len: usize,
    first: i64,
    last: i64,
}

impl TrailShape {
    fn of(trail: &Trail) -> Option<Self> {
        Some(Self {
            len: trail.len(),
            first: trail.first()?.timestamp,
            last: trail.last()?.timestamp,
        })
    }
}

#[derive(Clone, Debug, Default)]
struct Placed {
    marker: Option<PlacedMarker>,
    trail: Option<TrailShape>,
}

impl Placed {
    fn is_empty(&self) -> bool {
        self.marker.is_none() && self.trail.is_none()
    }
}

pub struct LiveMap<S: MapSurface> {
    surface: S,
    placed: BTreeMap<String, Placed>,
    selected: Option<String>,
    auto_follow: bool,
    follow_zoom: f64,
    route: RouteRecorder,
}

impl<S: MapSurface> LiveMap<S> {
    /// # Errors
    ///
    /// [`ConfigError::MissingMapToken`] when the access token is blank.
    pub fn new(config: &MapConfig, surface: S) -> Result<Self, ConfigError> {
        if config.access_token.trim().is_empty() {
            return Err(ConfigError::MissingMapToken);
        }
        Ok(Self {
            surface,
            placed: BTreeMap::new(),
            selected: None,
            auto_follow: false,
            follow_zoom: config.follow_zoom,
            route: RouteRecorder::new(),
        })
    }

    // =========================================================================
    // RECONCILIATION
    // =========================================================================

    /// Bring the surface in line with the roster.
    pub fn sync(&mut self, roster: &Roster) {
        for user in roster.iter() {
            self.sync_user(user);
        }

        let gone: Vec<String> = self
            .placed
            .keys()
            .filter(|id| !roster.contains(id))
            .cloned()
            .collect();
        for id in gone {
            self.remove_user(&id);
        }
    }

    fn sync_user(&mut self, user: &User) {
        let placed = self.placed.entry(user.id.clone()).or_default();
        let popup = MarkerPopup {
            name: user.name.clone(),
            role: user.role,
            status: user.status,
        };

        let mut moved_to = None;
        match user.location.map(|location| location.lat_lng()) {
            Some(at) if at.is_valid() => {
                let at = LngLat::from(at);
                match &mut placed.marker {
                    None => {
                        self.surface.add_marker(&user.id, at, &popup);
                        placed.marker = Some(PlacedMarker { at, popup: popup.clone() });
                        moved_to = Some(at);
                    }
                    Some(marker) => {
                        if marker.at != at {
                            self.surface.move_marker(&user.id, at);
                            marker.at = at;
                            moved_to = Some(at);
                        }
                        if marker.popup != popup {
                            self.surface.set_popup(&user.id, &popup);
                            marker.popup = popup.clone();
                        }
                    }
                }
            }
            Some(at) => {
                warn!(
                    user_id = %user.id,
                    latitude = at.latitude,
                    longitude = at.longitude,
                    "skipping marker with invalid coordinates"
                );
            }
            None => {
                if placed.marker.take().is_some() {
                    self.surface.remove_marker(&user.id);
                }
            }
        }

        if user.trail.len() >= 2 {
            let shape = TrailShape::of(&user.trail);
            if placed.trail != shape {
                let path: Vec<LngLat> = user
                    .trail
                    .iter()
                    .map(|point| LngLat::from(point.lat_lng()))
                    .collect();
                if placed.trail.is_none() {
                    self.surface.add_trail(&user.id, &path, popup.color());
                } else {
                    self.surface.set_trail(&user.id, &path);
                }
                placed.trail = shape;
            }
        } else if placed.trail.take().is_some() {
            self.surface.remove_trail_layer(&user.id);
            self.surface.remove_trail_source(&user.id);
        }

        if placed.is_empty() {
            self.placed.remove(&user.id);
        }

        if let Some(at) = moved_to {
            if self.auto_follow && self.selected.as_deref() == Some(user.id.as_str()) {
                self.surface.fly_to(at, self.follow_zoom);
            }
        }
    }

    fn remove_user(&mut self, id: &str) {
        let Some(placed) = self.placed.remove(id) else {
            return;
        };
        if placed.marker.is_some() {
            self.surface.remove_marker(id);
        }
        if placed.trail.is_some() {
            self.surface.remove_trail_layer(id);
            self.surface.remove_trail_source(id);
        }
        if self.selected.as_deref() == Some(id) {
            self.selected = None;
        }
        debug!(user_id = id, "user removed from map");
    }

    /// Remove everything this renderer placed. Leaves the surface empty.
    pub fn clear(&mut self) {
        let ids: Vec<String> = self.placed.keys().cloned().collect();
        for id in ids {
            self.remove_user(&id);
        }
        self.selected = None;
    }

    // =========================================================================
    // SELECTION
    // =========================================================================

    /// Select a user with a marker on the map. Returns false for unknown ids.
    pub fn select(&mut self, user_id: &str, recenter: bool) -> bool {
        let Some(at) = self.marker_position(user_id) else {
            return false;
        };
        self.selected = Some(user_id.to_owned());
        if recenter {
            self.surface.fly_to(at, self.follow_zoom);
        }
        true
    }

    pub fn deselect(&mut self) {
        self.selected = None;
    }

    pub fn set_auto_follow(&mut self, enabled: bool) {
        self.auto_follow = enabled;
    }

    #[must_use]
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    #[must_use]
    pub fn auto_follow(&self) -> bool {
        self.auto_follow
    }

    #[must_use]
    pub fn marker_position(&self, user_id: &str) -> Option<LngLat> {
        self.placed.get(user_id)?.marker.as_ref().map(|marker| marker.at)
    }

    #[must_use]
    pub fn has_trail(&self, user_id: &str) -> bool {
        self.placed.get(user_id).is_some_and(|placed| placed.trail.is_some())
    }

    #[must_use]
    pub fn marker_count(&self) -> usize {
        self.placed.values().filter(|placed| placed.marker.is_some()).count()
    }

    // =========================================================================
    // OUTBOUND GESTURES
    // =========================================================================

    /// # Errors
    ///
    /// [`MessageError`] for blank or oversized text.
    pub fn compose_message(&self, text: &str) -> Result<OutboundEvent, MessageError> {
        events::chat_message(text)
    }

    /// `location-update` for a local fix, or `None` when the fix is invalid.
    #[must_use]
    pub fn location_event(&self, sample: &LocationSample) -> Option<OutboundEvent> {
        if !sample.is_valid() {
            warn!(latitude = sample.latitude, longitude = sample.longitude, "not reporting invalid fix");
            return None;
        }
        Some(OutboundEvent::LocationUpdate(sample.to_report()))
    }

    // =========================================================================
    // ROUTE RECORDING
    // =========================================================================

    pub fn start_recording(&mut self) {
        self.route.start();
    }

    pub fn stop_recording(&mut self) {
        self.route.stop();
    }

    pub fn record_sample(&mut self, sample: &LocationSample) -> bool {
        self.route.record(sample)
    }

    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.route.is_recording()
    }

    #[must_use]
    pub fn recorded_route(&self) -> &[LocationSample] {
        self.route.points()
    }

    #[must_use]
    pub fn surface(&self) -> &S {
        &self.surface
    }
}

#[cfg(test)]
#[path = "live_map_test.rs"]
mod tests;
