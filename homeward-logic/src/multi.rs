use std::collections::HashMap;
use std::sync::Arc;

use log::warn;
use tokio::sync::Mutex;

use crate::channel::TrackApi;
use crate::errors::TrackingError;
use crate::events::TrackingEvents;
use crate::geo::LocationReading;
use crate::home::HomeStore;
use crate::options::{ReceiverOptions, ReceiverOptionsPatch};
use crate::receiver::LocationReceiver;

/// Tracks a small fleet of subjects, one independent [LocationReceiver] per
/// subject. There is deliberately no shared timer: a handful of dependents
/// per caregiver doesn't justify a scheduler.
pub struct MultiLocationReceiver<A: TrackApi, E: TrackingEvents, H: HomeStore> {
    api: Arc<A>,
    events: Arc<E>,
    home: Arc<H>,
    global: ReceiverOptions,
    receivers: Mutex<HashMap<String, Arc<LocationReceiver<A, E, H>>>>,
}

impl<A, E, H> MultiLocationReceiver<A, E, H>
where
    A: TrackApi + 'static,
    E: TrackingEvents + 'static,
    H: HomeStore + 'static,
{
    pub fn new(api: Arc<A>, events: Arc<E>, home: Arc<H>, global: ReceiverOptions) -> Self {
        Self {
            api,
            events,
            home,
            global,
            receivers: Mutex::new(HashMap::new()),
        }
    }

    /// Start tracking a subject with the global options, optionally patched
    /// per subject. Adding a subject that is already tracked is a warned
    /// no-op; the existing receiver and its timer are untouched.
    pub async fn add_user(
        &self,
        subject_id: &str,
        overrides: Option<ReceiverOptionsPatch>,
    ) -> Result<(), TrackingError> {
        if subject_id.is_empty() {
            return Err(TrackingError::EmptySubjectId);
        }

        let mut receivers = self.receivers.lock().await;
        if receivers.contains_key(subject_id) {
            warn!("subject {subject_id} is already tracked, ignoring add");
            return Ok(());
        }

        let options = match overrides {
            Some(patch) => patch.apply(&self.global),
            None => self.global.clone(),
        };
        let receiver = Arc::new(LocationReceiver::new(
            self.api.clone(),
            self.events.clone(),
            self.home.clone(),
            options,
        ));
        receiver.start_tracking(subject_id).await?;
        receivers.insert(subject_id.to_string(), receiver);
        Ok(())
    }

    /// Stop and discard a subject's receiver; no-op when absent.
    pub async fn remove_user(&self, subject_id: &str) {
        let receiver = self.receivers.lock().await.remove(subject_id);
        if let Some(receiver) = receiver {
            receiver.stop_tracking().await;
        }
    }

    /// Stop every tracked receiver and clear the fleet.
    pub async fn stop_all(&self) {
        let drained: Vec<_> = self.receivers.lock().await.drain().collect();
        for (_, receiver) in drained {
            receiver.stop_tracking().await;
        }
    }

    pub async fn receiver(&self, subject_id: &str) -> Option<Arc<LocationReceiver<A, E, H>>> {
        self.receivers.lock().await.get(subject_id).cloned()
    }

    pub async fn tracked_subjects(&self) -> Vec<String> {
        self.receivers.lock().await.keys().cloned().collect()
    }

    /// Last known reading for every tracked subject.
    pub async fn last_locations(&self) -> HashMap<String, Option<LocationReading>> {
        let receivers: Vec<_> = self
            .receivers
            .lock()
            .await
            .iter()
            .map(|(id, receiver)| (id.clone(), receiver.clone()))
            .collect();

        let mut locations = HashMap::with_capacity(receivers.len());
        for (id, receiver) in receivers {
            locations.insert(id, receiver.last_known_location().await);
        }
        locations
    }
}
