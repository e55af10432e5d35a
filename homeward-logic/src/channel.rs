use std::sync::Arc;

use log::warn;
use tokio::time::sleep;

use crate::errors::ApiError;
use crate::geo::LocationReading;
use crate::options::RetryPolicy;

/// Seam over the remote tracking service. Implemented over HTTP by
/// `homeward-transport`; errors arrive pre-classified as [ApiError].
pub trait TrackApi: Send + Sync {
    /// Publish the local device's reading.
    fn publish_track(
        &self,
        reading: &LocationReading,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
    /// Fetch the most recent reading reported for a subject.
    fn fetch_track(
        &self,
        subject_id: &str,
    ) -> impl Future<Output = Result<LocationReading, ApiError>> + Send;
}

/// Delivers readings to the tracking service with bounded retry and the
/// movement-based send suppression.
pub struct ReportingChannel<A: TrackApi> {
    api: Arc<A>,
}

impl<A: TrackApi> ReportingChannel<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    /// Whether a candidate reading moved far enough from the last *sent* one
    /// to be worth reporting. The first-ever reading always is.
    pub fn should_send(
        candidate: &LocationReading,
        last_sent: Option<&LocationReading>,
        distance_filter_m: f64,
    ) -> bool {
        match last_sent {
            None => true,
            Some(last) => candidate.distance_to(last) >= distance_filter_m,
        }
    }

    /// Publish a reading, retrying retryable failures up to
    /// `policy.max_attempts` total attempts with `policy.delay` between them.
    /// After exhaustion the last error surfaces to the caller; no retry state
    /// outlives the call.
    pub async fn deliver(
        &self,
        reading: &LocationReading,
        policy: &RetryPolicy,
    ) -> Result<(), ApiError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.api.publish_track(reading).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                    warn!(
                        "report delivery failed ({err}), retrying in {:?} ({attempt}/{})",
                        policy.delay, policy.max_attempts
                    );
                    sleep(policy.delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
