use std::f64::consts::TAU;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::{error, info};

use homeward_logic::{
    Accuracy, ApiError, Coordinate, EARTH_RADIUS_M, LocationChangeEvent, LocationReceiver,
    LocationSender, LocationSource, MemoryHomeStore, PermissionStatus, PresenceState,
    ReceiverOptions, SampleError, SenderOptions, TrackApi, TrackingEvents, TrackingStatus,
    prelude::*, save_home_location,
};
use homeward_transport::HttpTrackApi;

/// Poke the tracking service from a terminal: report positions as a device
/// would, or watch a subject as a caregiver app would.
#[derive(Parser)]
struct Cli {
    /// Bearer token for the tracking service; falls back to HOMEWARD_TOKEN
    #[arg(long)]
    token: Option<String>,

    /// Override the build-time service base URL
    #[arg(long)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report a single position and exit
    Send {
        latitude: f64,
        longitude: f64,
    },
    /// Keep reporting a randomly drifting position, until interrupted
    Roam {
        latitude: f64,
        longitude: f64,
        /// Meters of random drift per sample
        #[arg(long, default_value_t = 15.0)]
        drift_m: f64,
        /// Seconds between report ticks
        #[arg(long, default_value_t = 5)]
        interval_secs: u64,
    },
    /// Stream a subject's movements, errors, and presence transitions, until
    /// interrupted
    Watch {
        subject_id: String,
        /// Home latitude for presence classification
        #[arg(long, requires = "home_longitude")]
        home_latitude: Option<f64>,
        /// Home longitude for presence classification
        #[arg(long, requires = "home_latitude")]
        home_longitude: Option<f64>,
        /// Seconds between poll ticks
        #[arg(long, default_value_t = 5)]
        interval_secs: u64,
    },
    /// Fetch a subject's current position once and exit
    Get {
        subject_id: String,
    },
}

/// Location source that starts at a fixed point and wanders a bounded random
/// distance each sample. Drift 0 pins it in place.
struct SimulatedSource {
    position: Mutex<Coordinate>,
    drift_m: f64,
}

impl SimulatedSource {
    fn new(start: Coordinate, drift_m: f64) -> Self {
        Self {
            position: Mutex::new(start),
            drift_m,
        }
    }
}

impl LocationSource for SimulatedSource {
    async fn request_permissions(&self) -> PermissionStatus {
        PermissionStatus {
            foreground: true,
            background: true,
        }
    }

    async fn services_enabled(&self) -> bool {
        true
    }

    async fn current_position(&self, _accuracy: Accuracy) -> std::result::Result<Coordinate, SampleError> {
        let mut position = self.position.lock().expect("position lock");
        if self.drift_m > 0.0 {
            let bearing = rand::random_range(0.0..TAU);
            let degrees_per_meter = 180.0 / (EARTH_RADIUS_M * std::f64::consts::PI);
            position.latitude += self.drift_m * bearing.cos() * degrees_per_meter;
            position.longitude += self.drift_m * bearing.sin() * degrees_per_meter
                / position.latitude.to_radians().cos();
        }
        Ok(*position)
    }
}

/// Prints every receiver event through the logger.
struct ConsoleEvents;

impl TrackingEvents for ConsoleEvents {
    fn location_changed(&self, event: LocationChangeEvent) {
        let coords = event.location.coordinate;
        match event.distance_moved {
            Some(moved) => info!(
                "{} moved {moved:.0} m to ({:.5}, {:.5})",
                event.subject_id, coords.latitude, coords.longitude
            ),
            None => info!(
                "{} is at ({:.5}, {:.5})",
                event.subject_id, coords.latitude, coords.longitude
            ),
        }
    }

    fn error_occurred(&self, subject_id: &str, err: &ApiError) {
        error!("{subject_id}: {err}");
    }

    fn status_changed(&self, subject_id: &str, status: TrackingStatus) {
        info!("{subject_id} status: {status:?}");
    }

    fn presence_changed(
        &self,
        subject_id: &str,
        previous: Option<PresenceState>,
        next: PresenceState,
    ) {
        info!("{subject_id} presence: {previous:?} -> {next:?}");
    }
}

fn build_api(cli: &Cli) -> Result<Arc<HttpTrackApi>> {
    let token = cli
        .token
        .clone()
        .or_else(|| std::env::var("HOMEWARD_TOKEN").ok())
        .context("A bearer token is required (--token or HOMEWARD_TOKEN)")?;

    let api = match &cli.base_url {
        Some(base_url) => HttpTrackApi::with_base_url(base_url, token)?,
        None => HttpTrackApi::new(token)?,
    };
    Ok(Arc::new(api))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result {
    colog::init();

    let cli = Cli::parse();
    let api = build_api(&cli)?;

    match cli.command {
        Commands::Send {
            latitude,
            longitude,
        } => {
            let start = Coordinate::new(latitude, longitude).context("Invalid start position")?;
            let sender = Arc::new(LocationSender::new(
                SimulatedSource::new(start, 0.0),
                api,
                SenderOptions::default(),
            ));
            sender.send_once().await.context("Report failed")?;
            info!("reported ({latitude:.5}, {longitude:.5})");
        }
        Commands::Roam {
            latitude,
            longitude,
            drift_m,
            interval_secs,
        } => {
            let start = Coordinate::new(latitude, longitude).context("Invalid start position")?;
            let options = SenderOptions {
                interval: Duration::from_secs(interval_secs),
                ..Default::default()
            };
            let sender = Arc::new(LocationSender::new(
                SimulatedSource::new(start, drift_m),
                api,
                options,
            ));
            sender
                .start_tracking()
                .await
                .context("Failed to start reporting")?;
            info!("roaming from ({latitude:.5}, {longitude:.5}), ctrl-c to stop");

            tokio::signal::ctrl_c().await.context("Failed to wait for ctrl-c")?;
            sender.stop_tracking().await;
        }
        Commands::Watch {
            subject_id,
            home_latitude,
            home_longitude,
            interval_secs,
        } => {
            let home = Arc::new(MemoryHomeStore::default());
            if let (Some(lat), Some(lon)) = (home_latitude, home_longitude) {
                let reference = Coordinate::new(lat, lon).context("Invalid home position")?;
                save_home_location(home.as_ref(), &reference).await;
            }

            let options = ReceiverOptions {
                interval: Duration::from_secs(interval_secs),
                ..Default::default()
            };
            let receiver = Arc::new(LocationReceiver::new(
                api,
                Arc::new(ConsoleEvents),
                home,
                options,
            ));
            receiver
                .start_tracking(&subject_id)
                .await
                .context("Failed to start watching")?;
            info!("watching {subject_id}, ctrl-c to stop");

            tokio::signal::ctrl_c().await.context("Failed to wait for ctrl-c")?;
            receiver.stop_tracking().await;
        }
        Commands::Get { subject_id } => {
            let reading = api
                .fetch_track(&subject_id)
                .await
                .context("Fetch failed")?;
            let coords = reading.coordinate;
            println!(
                "{subject_id}: ({:.5}, {:.5}) altitude {:.1} m, speed {:.1} m/s, heading {:.0}",
                coords.latitude,
                coords.longitude,
                coords.altitude.unwrap_or(0.0),
                coords.speed.unwrap_or(0.0),
                coords.direction.unwrap_or(0.0),
            );
        }
    }

    Ok(())
}
