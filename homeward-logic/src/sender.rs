use std::sync::Arc;

use log::{error, info, warn};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;

use crate::channel::{ReportingChannel, TrackApi};
use crate::errors::TrackingError;
use crate::geo::LocationReading;
use crate::options::{SenderOptions, SenderOptionsPatch};
use crate::sampler::{LocationSource, Sampler};

#[derive(Default)]
struct SenderSession {
    active: bool,
    last_sent: Option<LocationReading>,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

/// Device-side orchestrator: periodically samples the device position and
/// reports it through a [ReportingChannel], suppressing near-duplicate
/// reports. Delivery failures are retried inside the tick and never stop the
/// loop.
pub struct LocationSender<L: LocationSource, A: TrackApi> {
    sampler: Sampler<L>,
    channel: ReportingChannel<A>,
    options: RwLock<SenderOptions>,
    session: Mutex<SenderSession>,
}

impl<L, A> LocationSender<L, A>
where
    L: LocationSource + 'static,
    A: TrackApi + 'static,
{
    pub fn new(source: L, api: Arc<A>, options: SenderOptions) -> Self {
        Self {
            sampler: Sampler::new(source),
            channel: ReportingChannel::new(api),
            options: RwLock::new(options),
            session: Mutex::new(SenderSession::default()),
        }
    }

    /// Begin periodic reporting. Fails before anything is scheduled when the
    /// foreground permission is missing or location services are off; calling
    /// while already tracking is a warned no-op.
    pub async fn start_tracking(self: &Arc<Self>) -> Result<(), TrackingError> {
        if self.session.lock().await.active {
            warn!("location reporting already started");
            return Ok(());
        }

        self.sampler.ensure_permission().await?;
        if !self.sampler.services_enabled().await {
            return Err(TrackingError::ServicesDisabled);
        }

        let cancel = CancellationToken::new();
        let mut session = self.session.lock().await;
        if session.active {
            warn!("location reporting already started");
            return Ok(());
        }
        session.active = true;
        session.cancel = Some(cancel.clone());
        session.task = Some(tokio::spawn({
            let sender = self.clone();
            async move {
                sender.main_loop(cancel).await;
            }
        }));
        drop(session);

        info!("location reporting started");
        Ok(())
    }

    /// Cancel the report loop and wait for any in-flight tick to resolve,
    /// then clear session state. Idempotent.
    pub async fn stop_tracking(&self) {
        let (cancel, task) = {
            let mut session = self.session.lock().await;
            if !session.active {
                warn!("location reporting is not active");
                return;
            }
            session.active = false;
            (session.cancel.take(), session.task.take())
        };

        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        if let Some(task) = task {
            task.await.ok();
        }

        self.session.lock().await.last_sent = None;
        info!("location reporting stopped");
    }

    /// One-shot report: permission check, single sample, single delivery.
    /// Leaves the periodic loop's state untouched.
    pub async fn send_once(&self) -> Result<(), TrackingError> {
        self.sampler.ensure_permission().await?;
        let (accuracy, retry) = {
            let options = self.options.read().await;
            (options.accuracy, options.retry)
        };
        let reading = self.sampler.acquire(accuracy).await?;
        self.channel.deliver(&reading, &retry).await?;
        Ok(())
    }

    /// Merge a partial options update. Per-tick values apply from the next
    /// tick; a changed interval takes effect when tracking restarts.
    pub async fn update_options(&self, patch: SenderOptionsPatch) {
        let mut options = self.options.write().await;
        let next = patch.apply(&options);
        if next.interval != options.interval && self.session.lock().await.active {
            warn!("report interval change takes effect when tracking restarts");
        }
        *options = next;
    }

    pub async fn is_tracking(&self) -> bool {
        self.session.lock().await.active
    }

    pub async fn last_known_location(&self) -> Option<LocationReading> {
        self.sampler.last_known().await
    }

    async fn main_loop(&self, cancel: CancellationToken) {
        let period = self.options.read().await.interval;
        let mut interval = interval_at(Instant::now() + period, period);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    break;
                }

                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    async fn tick(&self) {
        let (accuracy, distance_filter_m, retry) = {
            let options = self.options.read().await;
            (options.accuracy, options.distance_filter_m, options.retry)
        };

        let reading = match self.sampler.acquire(accuracy).await {
            Ok(reading) => reading,
            Err(err) => {
                warn!("skipping report tick, no reading available: {err}");
                return;
            }
        };

        let last_sent = {
            let session = self.session.lock().await;
            if !session.active {
                return;
            }
            session.last_sent
        };

        if !ReportingChannel::<A>::should_send(&reading, last_sent.as_ref(), distance_filter_m) {
            return;
        }

        match self.channel.deliver(&reading, &retry).await {
            Ok(()) => {
                let mut session = self.session.lock().await;
                // The session may have been stopped while the delivery was in
                // flight; its state is final at that point.
                if session.active {
                    session.last_sent = Some(reading);
                }
            }
            Err(err) => {
                error!("location report failed after retries: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ApiError, SampleError};
    use crate::geo::Coordinate;
    use crate::tests::{MockApi, MockSource, settle};
    use std::time::Duration;
    use tokio::time::sleep;

    const INTERVAL: Duration = Duration::from_secs(600_000);

    fn options() -> SenderOptions {
        SenderOptions {
            interval: INTERVAL,
            ..Default::default()
        }
    }

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    // The margin past the interval lets a tick's internal retry delays
    // resolve before the test resumes
    async fn advance_tick() {
        sleep(INTERVAL + Duration::from_secs(10)).await;
        settle().await;
    }

    fn new_sender(source: MockSource, api: Arc<MockApi>) -> Arc<LocationSender<MockSource, MockApi>> {
        Arc::new(LocationSender::new(source, api, options()))
    }

    #[tokio::test]
    async fn test_start_requires_permission() {
        tokio::time::pause();
        let sender = new_sender(MockSource::denied(), Arc::new(MockApi::default()));
        assert_eq!(
            sender.start_tracking().await,
            Err(TrackingError::PermissionDenied)
        );
        assert!(!sender.is_tracking().await);
    }

    #[tokio::test]
    async fn test_start_requires_services() {
        tokio::time::pause();
        let sender = new_sender(MockSource::services_off(), Arc::new(MockApi::default()));
        assert_eq!(
            sender.start_tracking().await,
            Err(TrackingError::ServicesDisabled)
        );
    }

    #[tokio::test]
    async fn test_first_reading_reports_and_nearby_suppressed() {
        tokio::time::pause();
        let source = MockSource::with_fixes(vec![
            Ok(coord(37.5665, 126.9780)),
            // A couple meters of drift, inside the 10 m filter
            Ok(coord(37.56651, 126.97801)),
            // Well outside the filter
            Ok(coord(37.5675, 126.9790)),
        ]);
        let api = Arc::new(MockApi::default());
        let sender = new_sender(source, api.clone());

        sender.start_tracking().await.unwrap();

        advance_tick().await;
        assert_eq!(api.publish_count(), 1, "first reading always reports");

        advance_tick().await;
        assert_eq!(api.publish_count(), 1, "near-duplicate suppressed");

        advance_tick().await;
        assert_eq!(api.publish_count(), 2, "real movement reports");

        sender.stop_tracking().await;
    }

    #[tokio::test]
    async fn test_last_sent_only_advances_on_confirmed_delivery() {
        tokio::time::pause();
        let home = coord(37.5665, 126.9780);
        let away = coord(37.5675, 126.9790);
        let source = MockSource::with_fixes(vec![Ok(home), Ok(away), Ok(away)]);
        let api = Arc::new(MockApi::default());
        let sender = new_sender(source, api.clone());

        sender.start_tracking().await.unwrap();
        advance_tick().await;
        assert_eq!(api.publish_count(), 1);

        // Second tick's delivery fails all attempts, so last_sent must stay
        // at the first reading
        for _ in 0..3 {
            api.push_publish(Err(ApiError::Network("down".into()))).await;
        }
        advance_tick().await;
        assert_eq!(api.publish_count(), 4, "three failed attempts");

        // Same position again: still >= 10 m from the last *sent* reading,
        // so the report is attempted again and now goes through
        advance_tick().await;
        assert_eq!(api.publish_count(), 5);
        let published = api.published().await;
        assert_eq!(published.len(), 2);
        assert_eq!(published[1].coordinate, away);

        sender.stop_tracking().await;
    }

    #[tokio::test]
    async fn test_failed_acquisition_skips_tick() {
        tokio::time::pause();
        let source = MockSource::with_fixes(vec![Err(SampleError::Unavailable(
            "gps timeout".into(),
        ))]);
        let api = Arc::new(MockApi::default());
        let sender = new_sender(source, api.clone());

        sender.start_tracking().await.unwrap();
        advance_tick().await;
        assert_eq!(api.publish_count(), 0);
        assert!(sender.is_tracking().await, "loop survives a missed fix");

        sender.stop_tracking().await;
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_double_start_warns() {
        tokio::time::pause();
        let source = MockSource::with_fixes(vec![]);
        let sender = new_sender(source, Arc::new(MockApi::default()));

        sender.start_tracking().await.unwrap();
        sender.start_tracking().await.unwrap();
        assert!(sender.is_tracking().await);

        sender.stop_tracking().await;
        assert!(!sender.is_tracking().await);
        // Second stop is a no-op
        sender.stop_tracking().await;
        assert!(!sender.is_tracking().await);
    }

    #[tokio::test]
    async fn test_send_once_does_not_touch_loop_state() {
        tokio::time::pause();
        let source = MockSource::with_fixes(vec![Ok(coord(37.5665, 126.9780))]);
        let api = Arc::new(MockApi::default());
        let sender = new_sender(source, api.clone());

        sender.send_once().await.unwrap();
        assert_eq!(api.publish_count(), 1);
        assert!(!sender.is_tracking().await);
        assert!(sender.last_known_location().await.is_some());
    }

    #[tokio::test]
    async fn test_send_once_requires_permission() {
        tokio::time::pause();
        let sender = new_sender(MockSource::denied(), Arc::new(MockApi::default()));
        assert_eq!(
            sender.send_once().await,
            Err(TrackingError::PermissionDenied)
        );
    }
}
