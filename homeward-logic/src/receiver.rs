use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

use crate::channel::TrackApi;
use crate::errors::{ApiError, TrackingError};
use crate::events::{LocationChangeEvent, TrackingEvents, TrackingStatus};
use crate::geo::LocationReading;
use crate::home::{HomeStore, load_home_location};
use crate::options::{ReceiverOptions, ReceiverOptionsPatch};
use crate::presence;

struct ReceiverSession {
    subject_id: Option<String>,
    active: bool,
    status: TrackingStatus,
    last_known: Option<LocationReading>,
    last_update: Option<Instant>,
    last_presence: Option<presence::PresenceState>,
    retry_count: u32,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

impl Default for ReceiverSession {
    fn default() -> Self {
        Self {
            subject_id: None,
            active: false,
            status: TrackingStatus::Stopped,
            last_known: None,
            last_update: None,
            last_presence: None,
            retry_count: 0,
            cancel: None,
            task: None,
        }
    }
}

/// Caregiver-side orchestrator for a single tracked subject: polls the
/// remote service, detects movement, classifies presence against the saved
/// home reference, and raises change/error/status events through the
/// injected [TrackingEvents] sink.
pub struct LocationReceiver<A: TrackApi, E: TrackingEvents, H: HomeStore> {
    api: Arc<A>,
    events: Arc<E>,
    home: Arc<H>,
    options: RwLock<ReceiverOptions>,
    session: Mutex<ReceiverSession>,
}

impl<A, E, H> LocationReceiver<A, E, H>
where
    A: TrackApi + 'static,
    E: TrackingEvents + 'static,
    H: HomeStore + 'static,
{
    pub fn new(api: Arc<A>, events: Arc<E>, home: Arc<H>, options: ReceiverOptions) -> Self {
        Self {
            api,
            events,
            home,
            options: RwLock::new(options),
            session: Mutex::new(ReceiverSession::default()),
        }
    }

    /// Begin polling a subject. The loop's first fetch fires immediately and
    /// its reading is announced unconditionally; after that, ticks run every
    /// `interval`. Calling while already tracking is a warned no-op.
    pub async fn start_tracking(self: &Arc<Self>, subject_id: &str) -> Result<(), TrackingError> {
        if subject_id.is_empty() {
            return Err(TrackingError::EmptySubjectId);
        }

        let cancel = CancellationToken::new();
        let mut session = self.session.lock().await;
        if session.active {
            warn!("already tracking a subject, ignoring start");
            return Ok(());
        }
        session.subject_id = Some(subject_id.to_string());
        session.active = true;
        session.retry_count = 0;
        self.set_status(&mut session, TrackingStatus::Tracking);
        session.cancel = Some(cancel.clone());
        session.task = Some(tokio::spawn({
            let receiver = self.clone();
            let subject = subject_id.to_string();
            async move {
                receiver.main_loop(subject, cancel).await;
            }
        }));
        drop(session);

        info!("started tracking subject {subject_id}");
        Ok(())
    }

    /// Cancel the poll loop, wait for any in-flight tick, and clear the
    /// session. Idempotent.
    pub async fn stop_tracking(&self) {
        let (cancel, task) = {
            let mut session = self.session.lock().await;
            if !session.active {
                warn!("not tracking any subject, ignoring stop");
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

        let mut session = self.session.lock().await;
        self.set_status(&mut session, TrackingStatus::Stopped);
        session.subject_id = None;
        session.last_known = None;
        session.last_update = None;
        session.last_presence = None;
        session.retry_count = 0;
        info!("stopped tracking");
    }

    /// Single fetch for a subject, bypassing the periodic loop and its state
    /// machine entirely.
    pub async fn location_once(&self, subject_id: &str) -> Result<LocationReading, ApiError> {
        self.api.fetch_track(subject_id).await
    }

    /// Merge a partial options update. Per-tick values apply from the next
    /// tick; a changed interval takes effect when tracking restarts.
    pub async fn update_options(&self, patch: ReceiverOptionsPatch) {
        let mut options = self.options.write().await;
        let next = patch.apply(&options);
        if next.interval != options.interval && self.session.lock().await.active {
            warn!("poll interval change takes effect when tracking restarts");
        }
        *options = next;
    }

    pub async fn is_tracking(&self) -> bool {
        self.session.lock().await.active
    }

    pub async fn status(&self) -> TrackingStatus {
        self.session.lock().await.status
    }

    pub async fn last_known_location(&self) -> Option<LocationReading> {
        self.session.lock().await.last_known
    }

    pub async fn retry_count(&self) -> u32 {
        self.session.lock().await.retry_count
    }

    fn set_status(&self, session: &mut ReceiverSession, status: TrackingStatus) {
        if session.status != status {
            session.status = status;
            if let Some(subject) = &session.subject_id {
                debug!("tracking status for {subject}: {status:?}");
                self.events.status_changed(subject, status);
            }
        }
    }

    async fn main_loop(&self, subject: String, cancel: CancellationToken) {
        let period = self.options.read().await.interval;
        let mut interval = tokio::time::interval(period);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    break;
                }

                _ = interval.tick() => {
                    self.tick(&subject, &cancel).await;
                }
            }
        }
    }

    async fn tick(&self, subject: &str, cancel: &CancellationToken) {
        let options = self.options.read().await.clone();

        match self.fetch_with_retry(subject, &options, cancel).await {
            Ok(reading) => self.apply_reading(subject, reading, &options).await,
            Err(err) => {
                let mut session = self.session.lock().await;
                if !session.active {
                    return;
                }
                session.retry_count = 0;
                self.events.error_occurred(subject, &err);
                self.set_status(&mut session, TrackingStatus::Error);
                self.check_offline(&mut session, &options);
            }
        }
    }

    /// Fetch the subject's reading, retrying retryable failures up to
    /// `retry.max_attempts` total attempts within this tick. Terminal kinds
    /// (forbidden, unknown subject) return immediately on the first failure.
    async fn fetch_with_retry(
        &self,
        subject: &str,
        options: &ReceiverOptions,
        cancel: &CancellationToken,
    ) -> Result<LocationReading, ApiError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.api.fetch_track(subject).await {
                Ok(reading) => return Ok(reading),
                Err(err) if err.is_retryable() && attempt < options.retry.max_attempts => {
                    {
                        let mut session = self.session.lock().await;
                        if !session.active {
                            return Err(err);
                        }
                        session.retry_count = attempt;
                    }
                    warn!(
                        "fetch for {subject} failed ({err}), retrying in {:?} ({attempt}/{})",
                        options.retry.delay, options.retry.max_attempts
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(err),
                        _ = sleep(options.retry.delay) => {}
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn apply_reading(
        &self,
        subject: &str,
        reading: LocationReading,
        options: &ReceiverOptions,
    ) {
        // Re-read the saved home each cycle; the UI may move it between ticks
        let home = load_home_location(self.home.as_ref()).await;

        let mut session = self.session.lock().await;
        if !session.active {
            return;
        }
        session.retry_count = 0;

        let previous = session.last_known;
        let distance_moved = previous.map(|prev| reading.distance_to(&prev));
        let moved_enough = match distance_moved {
            None => true,
            Some(d) => d >= options.change_threshold_m,
        };

        let next_presence = home.map(|home| {
            presence::classify(
                &reading.coordinate,
                &home,
                options.home_radius_m,
                options.destination.as_ref(),
            )
        });

        if moved_enough {
            self.events.location_changed(LocationChangeEvent {
                subject_id: subject.to_string(),
                location: reading,
                previous,
                distance_moved,
                presence: next_presence,
            });
        }

        if let Some(next) = next_presence {
            if presence::has_changed(session.last_presence, next) {
                self.events
                    .presence_changed(subject, session.last_presence, next);
            }
            session.last_presence = Some(next);
        }

        session.last_known = Some(reading);
        session.last_update = Some(Instant::now());
        self.set_status(&mut session, TrackingStatus::Tracking);
    }

    fn check_offline(&self, session: &mut ReceiverSession, options: &ReceiverOptions) {
        if let Some(last_update) = session.last_update {
            if last_update.elapsed() > options.offline_threshold {
                self.set_status(session, TrackingStatus::Offline);
            }
        }
    }
}
