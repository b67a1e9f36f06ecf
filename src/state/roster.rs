//! Roster of known participants and their bounded trails.

use std::collections::{BTreeMap, VecDeque};

use events::{
    LatLng, LocationBroadcast, PresenceChange, Role, UserPatch, UserStatus, WireTrailPoint,
    WireUser,
};
use serde::{Serialize, Serializer};
use tracing::{debug, warn};

pub const DEFAULT_TRAIL_CAPACITY: usize = 500;

// =============================================================================
// TRAIL
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TrailPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl TrailPoint {
    #[must_use]
    pub fn lat_lng(&self) -> LatLng {
        LatLng::new(self.latitude, self.longitude)
    }
}

impl From<WireTrailPoint> for TrailPoint {
    fn from(point: WireTrailPoint) -> Self {
        Self {
            latitude: point.latitude,
            longitude: point.longitude,
            timestamp: point.timestamp,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TrailError {
    #[error("trail point at {timestamp} is older than the last point at {last}")]
    OutOfOrder { timestamp: i64, last: i64 },
}

/// Ring buffer of positions with non-decreasing timestamps.
///
/// Once full, each new point evicts the oldest.
#[derive(Clone, Debug, PartialEq)]
pub struct Trail {
    points: VecDeque<TrailPoint>,
    capacity: usize,
}

impl Trail {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    /// Append a point.
    ///
    /// # Errors
    ///
    /// [`TrailError::OutOfOrder`] if the point is older than the newest one; the trail is unchanged.
    pub fn push(&mut self, point: TrailPoint) -> Result<(), TrailError> {
        if let Some(last) = self.points.back() {
            if point.timestamp < last.timestamp {
                return Err(TrailError::OutOfOrder {
                    timestamp: point.timestamp,
                    last: last.timestamp,
                });
            }
        }
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn first(&self) -> Option<&TrailPoint> {
        self.points.front()
    }

    #[must_use]
    pub fn last(&self) -> Option<&TrailPoint> {
        self.points.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrailPoint> {
        self.points.iter()
    }
}

impl Serialize for Trail {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.points)
    }
}

// =============================================================================
// USER
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

impl Location {
    #[must_use]
    pub fn lat_lng(&self) -> LatLng {
        LatLng::new(self.latitude, self.longitude)
    }
}

/// One roster entry.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub status: UserStatus,
    pub location: Option<Location>,
    pub trail: Trail,
    pub last_seen: Option<i64>,
    pub is_active: bool,
    pub last_activity: Option<i64>,
}

impl User {
    /// Build from a full wire entry. Out-of-order trail points are skipped.
    #[must_use]
    pub fn from_wire(wire: WireUser, trail_capacity: usize) -> Self {
        let mut trail = Trail::new(trail_capacity);
        for point in wire.trail {
            if let Err(error) = trail.push(point.into()) {
                debug!(user_id = %wire.id, %error, "skipping trail point");
            }
        }
        let location = wire.location.filter(LatLng::is_valid).map(|at| Location {
            latitude: at.latitude,
            longitude: at.longitude,
            accuracy: wire.accuracy,
            heading: wire.heading,
            speed: wire.speed,
        });
        Self {
            id: wire.id,
            name: wire.name,
            role: wire.role,
            status: wire.status,
            location,
            trail,
            last_seen: wire.last_seen,
            is_active: true,
            last_activity: None,
        }
    }
}

// =============================================================================
// ROSTER
// =============================================================================

/// What became of a relayed position fix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocationOutcome {
    Applied,
    /// No roster entry for the id; a partial update never creates one.
    UnknownUser,
    /// Older than the newest trail point; nothing changed.
    OutOfOrder,
    /// Coordinates outside WGS84 bounds.
    Invalid,
}

/// At most one entry per user id.
#[derive(Clone, Debug, PartialEq)]
pub struct Roster {
    users: BTreeMap<String, User>,
    trail_capacity: usize,
}

impl Default for Roster {
    fn default() -> Self {
        Self::new(DEFAULT_TRAIL_CAPACITY)
    }
}

impl Roster {
    #[must_use]
    pub fn new(trail_capacity: usize) -> Self {
        Self {
            users: BTreeMap::new(),
            trail_capacity,
        }
    }

    /// Replace every entry with a snapshot. Later duplicates of an id win.
    pub fn replace(&mut self, users: Vec<WireUser>) {
        self.users = users
            .into_iter()
            .map(|wire| (wire.id.clone(), User::from_wire(wire, self.trail_capacity)))
            .collect();
    }

    /// Returns false when the id is already present; the existing entry is kept.
    pub fn insert_if_absent(&mut self, wire: WireUser) -> bool {
        if self.users.contains_key(&wire.id) {
            return false;
        }
        let user = User::from_wire(wire, self.trail_capacity);
        self.users.insert(user.id.clone(), user);
        true
    }

    pub fn remove(&mut self, id: &str) -> Option<User> {
        self.users.remove(id)
    }

    pub fn clear(&mut self) {
        self.users.clear();
    }

    /// Merge the fields a `user-updated` carries. Unknown ids are dropped.
    pub fn apply_patch(&mut self, patch: &UserPatch) -> bool {
        let Some(user) = self.users.get_mut(&patch.id) else {
            debug!(user_id = %patch.id, "update for unknown user dropped");
            return false;
        };
        if let Some(name) = &patch.name {
            user.name.clone_from(name);
        }
        if let Some(role) = patch.role {
            user.role = role;
        }
        if let Some(status) = patch.status {
            user.status = status;
        }
        if let Some(at) = patch.location {
            if at.is_valid() {
                let previous = user.location;
                user.location = Some(Location {
                    latitude: at.latitude,
                    longitude: at.longitude,
                    accuracy: patch.accuracy.or(previous.and_then(|l| l.accuracy)),
                    heading: patch.heading.or(previous.and_then(|l| l.heading)),
                    speed: patch.speed.or(previous.and_then(|l| l.speed)),
                });
            } else {
                warn!(user_id = %patch.id, "ignoring invalid location in user update");
            }
        }
        if let Some(last_seen) = patch.last_seen {
            user.last_seen = Some(last_seen);
        }
        true
    }

    /// Move a user and extend their trail.
    pub fn apply_location(&mut self, update: &LocationBroadcast) -> LocationOutcome {
        let Some(user) = self.users.get_mut(&update.user_id) else {
            debug!(user_id = %update.user_id, "location for unknown user dropped");
            return LocationOutcome::UnknownUser;
        };
        if !update.location.is_valid() {
            warn!(
                user_id = %update.user_id,
                latitude = update.location.latitude,
                longitude = update.location.longitude,
                "dropping location with invalid coordinates"
            );
            return LocationOutcome::Invalid;
        }
        let point = TrailPoint {
            latitude: update.location.latitude,
            longitude: update.location.longitude,
            timestamp: update.timestamp,
        };
        if let Err(error) = user.trail.push(point) {
            warn!(user_id = %update.user_id, %error, "dropping out-of-order location");
            return LocationOutcome::OutOfOrder;
        }
        user.location = Some(Location {
            latitude: point.latitude,
            longitude: point.longitude,
            accuracy: update.accuracy,
            heading: update.heading,
            speed: update.speed,
        });
        user.last_seen = Some(update.timestamp);
        LocationOutcome::Applied
    }

    pub fn set_status(&mut self, id: &str, status: UserStatus) -> bool {
        let Some(user) = self.users.get_mut(id) else {
            return false;
        };
        user.status = status;
        true
    }

    pub fn set_presence(&mut self, change: &PresenceChange) -> bool {
        let Some(user) = self.users.get_mut(&change.user_id) else {
            return false;
        };
        user.is_active = change.is_active;
        if change.last_activity.is_some() {
            user.last_activity = change.last_activity;
        }
        true
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&User> {
        self.users.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.users.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    #[must_use]
    pub fn trail_capacity(&self) -> usize {
        self.trail_capacity
    }
}

#[cfg(test)]
#[path = "roster_test.rs"]
mod tests;
