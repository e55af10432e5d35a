mod channel;
mod errors;
mod events;
mod geo;
mod home;
mod monitor;
mod multi;
mod options;
mod presence;
mod receiver;
mod sampler;
mod sender;

pub use channel::{ReportingChannel, TrackApi};
pub use errors::{ApiError, InvalidCoordinate, SampleError, TrackingError};
pub use events::{LocationChangeEvent, PresenceSink, TrackingEvents, TrackingStatus};
pub use geo::{Coordinate, EARTH_RADIUS_M, LocationReading, UtcDT, distance_meters};
pub use home::{
    HOME_LOCATION_KEY, HomeStore, MemoryHomeStore, load_home_location, save_home_location,
};
pub use monitor::HomeMonitor;
pub use multi::MultiLocationReceiver;
pub use options::{
    MonitorOptions, ReceiverOptions, ReceiverOptionsPatch, RetryPolicy, SenderOptions,
    SenderOptionsPatch,
};
pub use presence::{
    DEFAULT_HOME_RADIUS_M, HomePresence, PresenceState, classify, classify_home, has_changed,
};
pub use receiver::LocationReceiver;
pub use sampler::{Accuracy, LocationSource, PermissionStatus, Sampler};
pub use sender::LocationSender;

pub mod prelude {
    use anyhow::Error as AnyhowError;
    use std::result::Result as StdResult;
    pub type Result<T = (), E = AnyhowError> = StdResult<T, E>;
    pub use anyhow::Context;
}
