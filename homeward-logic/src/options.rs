use std::time::Duration;

use crate::geo::Coordinate;
use crate::presence::DEFAULT_HOME_RADIUS_M;
use crate::sampler::Accuracy;

/// How a bounded delivery/fetch is retried: at most `max_attempts` tries with
/// a fixed `delay` between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(2000),
        }
    }
}

/// Settings for the device-side report loop
#[derive(Debug, Clone)]
pub struct SenderOptions {
    /// Time between report ticks
    pub interval: Duration,
    /// Minimum movement since the last *sent* reading before another report
    /// goes out
    pub distance_filter_m: f64,
    /// Fix accuracy requested from the platform
    pub accuracy: Accuracy,
    /// Retry policy for a single delivery
    pub retry: RetryPolicy,
}

impl Default for SenderOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(5000),
            distance_filter_m: 10.0,
            accuracy: Accuracy::High,
            retry: RetryPolicy::default(),
        }
    }
}

/// Partial update for [SenderOptions]; unset fields keep their current value.
#[derive(Debug, Clone, Default)]
pub struct SenderOptionsPatch {
    pub interval: Option<Duration>,
    pub distance_filter_m: Option<f64>,
    pub accuracy: Option<Accuracy>,
    pub retry: Option<RetryPolicy>,
}

impl SenderOptionsPatch {
    pub fn apply(self, base: &SenderOptions) -> SenderOptions {
        SenderOptions {
            interval: self.interval.unwrap_or(base.interval),
            distance_filter_m: self.distance_filter_m.unwrap_or(base.distance_filter_m),
            accuracy: self.accuracy.unwrap_or(base.accuracy),
            retry: self.retry.unwrap_or(base.retry),
        }
    }
}

/// Settings for a caregiver-side subject watch loop
#[derive(Debug, Clone)]
pub struct ReceiverOptions {
    /// Time between fetch ticks
    pub interval: Duration,
    /// Retry policy for a single tick's fetch
    pub retry: RetryPolicy,
    /// Minimum movement since the last known reading before a change event
    /// fires
    pub change_threshold_m: f64,
    /// How long without a fresh reading before the subject counts as offline
    pub offline_threshold: Duration,
    /// Radius of the home geofence used for presence classification
    pub home_radius_m: f64,
    /// Where the subject said they were going, if anywhere
    pub destination: Option<Coordinate>,
}

impl Default for ReceiverOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(5000),
            retry: RetryPolicy::default(),
            change_threshold_m: 5.0,
            offline_threshold: Duration::from_millis(30_000),
            home_radius_m: DEFAULT_HOME_RADIUS_M,
            destination: None,
        }
    }
}

/// Partial update for [ReceiverOptions]; unset fields keep their current
/// value. `destination` is replaced wholesale when set (use `Some(None)` to
/// clear it).
#[derive(Debug, Clone, Default)]
pub struct ReceiverOptionsPatch {
    pub interval: Option<Duration>,
    pub retry: Option<RetryPolicy>,
    pub change_threshold_m: Option<f64>,
    pub offline_threshold: Option<Duration>,
    pub home_radius_m: Option<f64>,
    pub destination: Option<Option<Coordinate>>,
}

impl ReceiverOptionsPatch {
    pub fn apply(self, base: &ReceiverOptions) -> ReceiverOptions {
        ReceiverOptions {
            interval: self.interval.unwrap_or(base.interval),
            retry: self.retry.unwrap_or(base.retry),
            change_threshold_m: self.change_threshold_m.unwrap_or(base.change_threshold_m),
            offline_threshold: self.offline_threshold.unwrap_or(base.offline_threshold),
            home_radius_m: self.home_radius_m.unwrap_or(base.home_radius_m),
            destination: self.destination.unwrap_or(base.destination),
        }
    }
}

/// Settings for the device-side home departure watcher
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    /// Time between presence checks
    pub interval: Duration,
    /// Radius of the home geofence
    pub home_radius_m: f64,
    /// Fix accuracy requested from the platform
    pub accuracy: Accuracy,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(10_000),
            home_radius_m: DEFAULT_HOME_RADIUS_M,
            accuracy: Accuracy::High,
        }
    }
}
