//! Live map rendering pipeline.
//!
//! DESIGN
//! ======
//! The map widget itself (tiles, chrome, hit testing) is an external
//! collaborator reached through [`MapSurface`]. [`LiveMap`] keeps exactly one
//! marker and at most one trail layer per roster entry on that surface and
//! diffs each roster snapshot against what it already placed, so markers are
//! moved in place and never recreated.
//!
//! Local gestures (chat send, position reports) come back out as
//! [`events::OutboundEvent`]s; route recording stays local and ends up in the
//! JSON export.

mod export;
mod live_map;
mod route;
mod surface;

pub use export::{ExportDocument, ExportError, export_file_name, write_export};
pub use live_map::LiveMap;
pub use route::RouteRecorder;
pub use surface::{LngLat, MapSurface, MarkerPopup, TracingSurface, marker_color};

pub const FOLLOW_ZOOM: f64 = 16.0;

/// Map provider settings.
#[derive(Debug, Clone, PartialEq)]
pub struct MapConfig {
    /// Provider access token. Required; a blank token is fatal.
    pub access_token: String,
    /// Zoom used when selecting or following a user.
    pub follow_zoom: f64,
}

impl MapConfig {
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            follow_zoom: FOLLOW_ZOOM,
        }
    }
}
