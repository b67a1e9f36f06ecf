//! Seam between the renderer and the map widget.

use events::{LatLng, Role, UserStatus};
use tracing::{debug, info};

/// Map-widget coordinate order: longitude first.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    #[must_use]
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }
}

impl From<LatLng> for LngLat {
    fn from(at: LatLng) -> Self {
        Self::new(at.longitude, at.latitude)
    }
}

/// Content of a marker's popup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarkerPopup {
    pub name: String,
    pub role: Role,
    pub status: UserStatus,
}

impl MarkerPopup {
    #[must_use]
    pub fn color(&self) -> &'static str {
        marker_color(self.role, self.status)
    }

    /// One-line label, e.g. `Ann (supervisor, away)`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} ({}, {})", self.name, self.role.as_str(), self.status.as_str())
    }
}

/// Marker and trail color. Offline users are greyed out regardless of role.
#[must_use]
pub fn marker_color(role: Role, status: UserStatus) -> &'static str {
    if status == UserStatus::Offline {
        return "#9ca3af";
    }
    match role {
        Role::Admin => "#ef4444",
        Role::Supervisor => "#f59e0b",
        Role::Worker => "#3b82f6",
    }
}

/// Operations the renderer needs from a map widget.
///
/// Trails are a layer drawn from a separate data source. Both are keyed by
/// the user id and must be removed independently.
pub trait MapSurface {
    fn add_marker(&mut self, user_id: &str, at: LngLat, popup: &MarkerPopup);
    fn move_marker(&mut self, user_id: &str, at: LngLat);
    fn set_popup(&mut self, user_id: &str, popup: &MarkerPopup);
    /// Removes the marker together with its popup.
    fn remove_marker(&mut self, user_id: &str);
    /// Creates the trail's data source and the line layer drawing it.
    fn add_trail(&mut self, user_id: &str, path: &[LngLat], color: &str);
    /// Replaces the geometry of an existing trail source.
    fn set_trail(&mut self, user_id: &str, path: &[LngLat]);
    fn remove_trail_layer(&mut self, user_id: &str);
    fn remove_trail_source(&mut self, user_id: &str);
    fn fly_to(&mut self, at: LngLat, zoom: f64);
}

/// Headless surface that logs every operation. Used by the binary.
#[derive(Debug, Default)]
pub struct TracingSurface {
    markers: usize,
    trails: usize,
}

impl TracingSurface {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn markers(&self) -> usize {
        self.markers
    }

    #[must_use]
    pub fn trails(&self) -> usize {
        self.trails
    }
}

impl MapSurface for TracingSurface {
    fn add_marker(&mut self, user_id: &str, at: LngLat, popup: &MarkerPopup) {
        self.markers += 1;
        info!(user_id, lng = at.lng, lat = at.lat, label = %popup.label(), "marker added");
    }

    fn move_marker(&mut self, user_id: &str, at: LngLat) {
        debug!(user_id, lng = at.lng, lat = at.lat, "marker moved");
    }

    fn set_popup(&mut self, user_id: &str, popup: &MarkerPopup) {
        debug!(user_id, label = %popup.label(), "popup refreshed");
    }

    fn remove_marker(&mut self, user_id: &str) {
        self.markers = self.markers.saturating_sub(1);
        info!(user_id, "marker removed");
    }

    fn add_trail(&mut self, user_id: &str, path: &[LngLat], color: &str) {
        self.trails += 1;
        debug!(user_id, points = path.len(), color, "trail added");
    }

    fn set_trail(&mut self, user_id: &str, path: &[LngLat]) {
        debug!(user_id, points = path.len(), "trail updated");
    }

    fn remove_trail_layer(&mut self, user_id: &str) {
        self.trails = self.trails.saturating_sub(1);
        debug!(user_id, "trail layer removed");
    }

    fn remove_trail_source(&mut self, user_id: &str) {
        debug!(user_id, "trail source removed");
    }

    fn fly_to(&mut self, at: LngLat, zoom: f64) {
        info!(lng = at.lng, lat = at.lat, zoom, "view recentered");
    }
}
