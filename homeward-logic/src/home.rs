use log::warn;

use crate::geo::Coordinate;

/// Storage key the mobile app has always used for the saved home coordinate.
pub const HOME_LOCATION_KEY: &str = "homeLocation";

/// Seam over the durable key-value store that owns the home reference. Only
/// the UI writes it; this core re-reads it once per classification cycle.
pub trait HomeStore: Send + Sync {
    fn get(&self, key: &str) -> impl Future<Output = Option<String>> + Send;
    fn set(&self, key: &str, value: &str) -> impl Future<Output = ()> + Send;
}

/// Load and validate the saved home coordinate. A missing, malformed, or
/// out-of-range value reads as "no home saved" (logged, never fatal).
pub async fn load_home_location<H: HomeStore>(store: &H) -> Option<Coordinate> {
    let raw = store.get(HOME_LOCATION_KEY).await?;
    match serde_json::from_str::<Coordinate>(&raw) {
        Ok(coordinate) => match coordinate.validate() {
            Ok(()) => Some(coordinate),
            Err(err) => {
                warn!("stored home location is out of range: {err}");
                None
            }
        },
        Err(err) => {
            warn!("stored home location is not valid JSON: {err}");
            None
        }
    }
}

pub async fn save_home_location<H: HomeStore>(store: &H, home: &Coordinate) {
    let encoded = serde_json::to_string(home).expect("coordinate serializes");
    store.set(HOME_LOCATION_KEY, &encoded).await;
}

/// In-memory [HomeStore], for tests and tools without platform storage.
#[derive(Debug, Default)]
pub struct MemoryHomeStore {
    entries: tokio::sync::RwLock<std::collections::HashMap<String, String>>,
}

impl HomeStore for MemoryHomeStore {
    async fn get(&self, key: &str) -> Option<String> {
        self.entries.read().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: &str) {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
    }
}
