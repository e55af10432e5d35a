use crate::errors::ApiError;
use crate::geo::LocationReading;
use crate::presence::{HomePresence, PresenceState};

/// Lifecycle of a tracking session as seen by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingStatus {
    Stopped,
    Tracking,
    Error,
    Offline,
}

/// A subject moved far enough for consumers to care.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationChangeEvent {
    pub subject_id: String,
    pub location: LocationReading,
    /// Previous known reading; `None` for the first reading of a session
    pub previous: Option<LocationReading>,
    /// Meters moved since the previous reading, when one exists
    pub distance_moved: Option<f64>,
    /// Presence classification for this reading, when a home reference is
    /// saved
    pub presence: Option<PresenceState>,
}

/// Consumer-implemented sink for receiver-side events. Injected at
/// construction; every method defaults to a no-op so consumers implement
/// only what they need.
pub trait TrackingEvents: Send + Sync {
    fn location_changed(&self, _event: LocationChangeEvent) {}
    fn error_occurred(&self, _subject_id: &str, _error: &ApiError) {}
    fn status_changed(&self, _subject_id: &str, _status: TrackingStatus) {}
    fn presence_changed(
        &self,
        _subject_id: &str,
        _previous: Option<PresenceState>,
        _next: PresenceState,
    ) {
    }
}

/// Sink for the device-side home watcher's transitions.
pub trait PresenceSink: Send + Sync {
    fn presence_changed(&self, previous: Option<HomePresence>, next: HomePresence);
}
