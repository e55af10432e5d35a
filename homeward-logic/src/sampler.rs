use log::warn;
use tokio::sync::RwLock;

use crate::errors::SampleError;
use crate::geo::{Coordinate, LocationReading};

/// Fix accuracy requested from the platform positioning subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Accuracy {
    /// Coarse, cell/wifi level
    Low,
    /// Whatever the platform considers a reasonable tradeoff
    Balanced,
    /// Full GPS fix
    #[default]
    High,
}

/// Outcome of asking the platform for location permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionStatus {
    pub foreground: bool,
    pub background: bool,
}

/// Seam over the platform permission/positioning provider.
pub trait LocationSource: Send + Sync {
    /// Prompt for foreground and background location permissions.
    fn request_permissions(&self) -> impl Future<Output = PermissionStatus> + Send;
    /// Whether the platform location subsystem is active at all.
    fn services_enabled(&self) -> impl Future<Output = bool> + Send;
    /// Attempt a fresh position fix.
    fn current_position(
        &self,
        accuracy: Accuracy,
    ) -> impl Future<Output = Result<Coordinate, SampleError>> + Send;
}

/// Wraps a [LocationSource] with the session-level fallback behavior: a
/// failed fix falls back to the last successful reading when one exists.
pub struct Sampler<L: LocationSource> {
    source: L,
    last_known: RwLock<Option<LocationReading>>,
}

impl<L: LocationSource> Sampler<L> {
    pub fn new(source: L) -> Self {
        Self {
            source,
            last_known: RwLock::new(None),
        }
    }

    /// Request permissions, failing only when the foreground grant is
    /// missing. A denied background grant limits tracking to the foreground,
    /// which is worth a warning but not a failure.
    pub async fn ensure_permission(&self) -> Result<(), SampleError> {
        let status = self.source.request_permissions().await;
        if !status.foreground {
            return Err(SampleError::PermissionDenied);
        }
        if !status.background {
            warn!("background location permission denied, tracking limited to foreground");
        }
        Ok(())
    }

    pub async fn services_enabled(&self) -> bool {
        self.source.services_enabled().await
    }

    /// Produce a reading: a fresh fix when possible, otherwise the last
    /// successful one. Fails only when neither exists.
    pub async fn acquire(&self, accuracy: Accuracy) -> Result<LocationReading, SampleError> {
        match self.source.current_position(accuracy).await {
            Ok(coordinate) => {
                coordinate
                    .validate()
                    .map_err(|err| SampleError::Unavailable(err.to_string()))?;
                let reading = LocationReading::now(coordinate);
                *self.last_known.write().await = Some(reading);
                Ok(reading)
            }
            Err(err) => {
                let last = *self.last_known.read().await;
                if let Some(reading) = last {
                    warn!("position fix failed ({err}), reusing last known reading");
                    Ok(reading)
                } else {
                    Err(err)
                }
            }
        }
    }

    pub async fn last_known(&self) -> Option<LocationReading> {
        *self.last_known.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::MockSource;

    #[tokio::test]
    async fn test_fresh_fix_updates_fallback() {
        let source = MockSource::with_fixes(vec![Ok(Coordinate::new(1.0, 2.0).unwrap())]);
        let sampler = Sampler::new(source);

        let reading = sampler.acquire(Accuracy::High).await.unwrap();
        assert_eq!(reading.coordinate.latitude, 1.0);
        assert_eq!(sampler.last_known().await, Some(reading));
    }

    #[tokio::test]
    async fn test_failed_fix_falls_back_to_last_known() {
        let source = MockSource::with_fixes(vec![
            Ok(Coordinate::new(1.0, 2.0).unwrap()),
            Err(SampleError::Unavailable("gps timeout".into())),
        ]);
        let sampler = Sampler::new(source);

        let first = sampler.acquire(Accuracy::High).await.unwrap();
        let second = sampler.acquire(Accuracy::High).await.unwrap();
        assert_eq!(first, second, "stale reading should be reused");
    }

    #[tokio::test]
    async fn test_failed_fix_without_fallback_is_hard() {
        let source =
            MockSource::with_fixes(vec![Err(SampleError::Unavailable("gps timeout".into()))]);
        let sampler = Sampler::new(source);

        assert!(sampler.acquire(Accuracy::High).await.is_err());
    }

    #[tokio::test]
    async fn test_out_of_range_fix_is_rejected() {
        let source = MockSource::with_fixes(vec![Ok(Coordinate {
            latitude: 120.0,
            longitude: 0.0,
            altitude: None,
            speed: None,
            direction: None,
        })]);
        let sampler = Sampler::new(source);

        assert!(matches!(
            sampler.acquire(Accuracy::High).await,
            Err(SampleError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_foreground_denial_is_fatal() {
        let source = MockSource::denied();
        let sampler = Sampler::new(source);
        assert_eq!(
            sampler.ensure_permission().await,
            Err(SampleError::PermissionDenied)
        );
    }

    #[tokio::test]
    async fn test_background_denial_is_soft() {
        let source = MockSource::foreground_only();
        let sampler = Sampler::new(source);
        assert!(sampler.ensure_permission().await.is_ok());
    }
}
