use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;

use crate::errors::TrackingError;
use crate::events::PresenceSink;
use crate::home::{HomeStore, load_home_location};
use crate::options::MonitorOptions;
use crate::presence::{HomePresence, classify_home};
use crate::sampler::{LocationSource, Sampler};

#[derive(Default)]
struct MonitorSession {
    active: bool,
    last_presence: Option<HomePresence>,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

/// Device-side home watcher: periodically samples the device position,
/// compares it against the saved home reference, and announces departures
/// and returns through the injected [PresenceSink]. Only transitions are
/// announced, never every sample.
pub struct HomeMonitor<L: LocationSource, H: HomeStore, S: PresenceSink> {
    sampler: Sampler<L>,
    home: Arc<H>,
    sink: Arc<S>,
    options: RwLock<MonitorOptions>,
    session: Mutex<MonitorSession>,
}

impl<L, H, S> HomeMonitor<L, H, S>
where
    L: LocationSource + 'static,
    H: HomeStore + 'static,
    S: PresenceSink + 'static,
{
    pub fn new(source: L, home: Arc<H>, sink: Arc<S>, options: MonitorOptions) -> Self {
        Self {
            sampler: Sampler::new(source),
            home,
            sink,
            options: RwLock::new(options),
            session: Mutex::new(MonitorSession::default()),
        }
    }

    /// Begin watching. Same preconditions as the report loop: foreground
    /// permission and enabled location services. Warned no-op when already
    /// running.
    pub async fn start(self: &Arc<Self>) -> Result<(), TrackingError> {
        if self.session.lock().await.active {
            warn!("home watch already started");
            return Ok(());
        }

        self.sampler.ensure_permission().await?;
        if !self.sampler.services_enabled().await {
            return Err(TrackingError::ServicesDisabled);
        }

        let cancel = CancellationToken::new();
        let mut session = self.session.lock().await;
        if session.active {
            warn!("home watch already started");
            return Ok(());
        }
        session.active = true;
        session.cancel = Some(cancel.clone());
        session.task = Some(tokio::spawn({
            let monitor = self.clone();
            async move {
                monitor.main_loop(cancel).await;
            }
        }));
        drop(session);

        info!("home watch started");
        Ok(())
    }

    /// Cancel the watch loop and clear its transition memory. Idempotent.
    pub async fn stop(&self) {
        let (cancel, task) = {
            let mut session = self.session.lock().await;
            if !session.active {
                warn!("home watch is not active");
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

        self.session.lock().await.last_presence = None;
        info!("home watch stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.session.lock().await.active
    }

    pub async fn last_presence(&self) -> Option<HomePresence> {
        self.session.lock().await.last_presence
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
        let (accuracy, home_radius_m) = {
            let options = self.options.read().await;
            (options.accuracy, options.home_radius_m)
        };

        let reading = match self.sampler.acquire(accuracy).await {
            Ok(reading) => reading,
            Err(err) => {
                warn!("skipping presence check, no reading available: {err}");
                return;
            }
        };

        let Some(home) = load_home_location(self.home.as_ref()).await else {
            debug!("no home location saved, skipping presence check");
            return;
        };

        let next = classify_home(&reading.coordinate, &home, home_radius_m);

        let mut session = self.session.lock().await;
        if !session.active {
            return;
        }
        if session.last_presence != Some(next) {
            self.sink.presence_changed(session.last_presence, next);
        }
        session.last_presence = Some(next);
    }
}
