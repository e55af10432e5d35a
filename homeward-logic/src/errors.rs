use thiserror::Error;

pub use crate::geo::InvalidCoordinate;

/// Failure reported by a [crate::LocationSource] when a fix can't be produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SampleError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("location services are disabled")]
    ServicesDisabled,
    #[error("no position fix available: {0}")]
    Unavailable(String),
}

/// Failure reported by a [crate::TrackApi] call, classified exactly once at
/// the transport boundary. The core never inspects status codes itself.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error("not authenticated")]
    Unauthorized,
    #[error("not allowed to access this subject's location")]
    Forbidden,
    #[error("subject does not exist")]
    UserNotFound,
    #[error("network failure: {0}")]
    Network(String),
    #[error("service error, status {0}")]
    Api(u16),
    #[error("service returned an out-of-range coordinate")]
    InvalidPayload(#[from] InvalidCoordinate),
}

impl ApiError {
    /// Forbidden and unknown-subject responses will not get better by asking
    /// again; everything else is worth retrying.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ApiError::Forbidden | ApiError::UserNotFound | ApiError::InvalidPayload(_)
        )
    }
}

/// Synchronous failures of the imperative tracking surface.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackingError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("location services are disabled")]
    ServicesDisabled,
    #[error("subject id must not be empty")]
    EmptySubjectId,
    #[error("could not produce a location fix")]
    LocationUnavailable(#[source] SampleError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl From<SampleError> for TrackingError {
    fn from(err: SampleError) -> Self {
        match err {
            SampleError::PermissionDenied => TrackingError::PermissionDenied,
            SampleError::ServicesDisabled => TrackingError::ServicesDisabled,
            err => TrackingError::LocationUnavailable(err),
        }
    }
}
