use serde::{Deserialize, Serialize};

use crate::geo::{Coordinate, distance_meters};

/// Radius around the home reference inside which a subject counts as home.
pub const DEFAULT_HOME_RADIUS_M: f64 = 150.0;

/// Where a tracked subject is relative to their saved home, as shown to
/// caregivers. Serialized in snake_case to match the service's status strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceState {
    /// Within the home radius
    AtHome,
    /// Outside the home radius, heading somewhere known
    OutWithDestination,
    /// Outside the home radius with no known destination
    OutWithoutDestination,
}

impl PresenceState {
    pub fn is_away(&self) -> bool {
        !matches!(self, PresenceState::AtHome)
    }
}

/// The send-side reduction of [PresenceState]: the device only knows whether
/// it left home, not why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomePresence {
    AtHome,
    Away,
}

/// Classify a reading against the home reference. Strictly more than
/// `threshold_m` away counts as out; the boundary itself is still home.
pub fn classify(
    current: &Coordinate,
    home: &Coordinate,
    threshold_m: f64,
    destination: Option<&Coordinate>,
) -> PresenceState {
    if distance_meters(current, home) > threshold_m {
        if destination.is_some() {
            PresenceState::OutWithDestination
        } else {
            PresenceState::OutWithoutDestination
        }
    } else {
        PresenceState::AtHome
    }
}

pub fn classify_home(current: &Coordinate, home: &Coordinate, threshold_m: f64) -> HomePresence {
    if distance_meters(current, home) > threshold_m {
        HomePresence::Away
    } else {
        HomePresence::AtHome
    }
}

/// Whether a freshly classified state should be announced: always for the
/// first classification, otherwise only on an actual transition.
pub fn has_changed(previous: Option<PresenceState>, next: PresenceState) -> bool {
    previous != Some(next)
}
