use std::time::Duration;

use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use homeward_logic::{ApiError, Coordinate, InvalidCoordinate, LocationReading, TrackApi, prelude::*};

use crate::server::{API_BASE_URL, TRACK_PATH, track_subject_path};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Body of the device's position report. Unknown optional readings go out
/// as 0, which is what the service expects.
#[derive(Debug, Clone, Serialize)]
struct TrackUpdateRequest {
    latitude: f64,
    longitude: f64,
    altitude: f64,
    speed: f64,
    direction: f64,
}

impl From<&LocationReading> for TrackUpdateRequest {
    fn from(reading: &LocationReading) -> Self {
        let coords = reading.coordinate;
        Self {
            latitude: coords.latitude,
            longitude: coords.longitude,
            altitude: coords.altitude.unwrap_or(0.0),
            speed: coords.speed.unwrap_or(0.0),
            direction: coords.direction.unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct TrackUpdateResponse {
    detail: String,
}

#[derive(Debug, Clone, Deserialize)]
struct TrackResponse {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    altitude: f64,
    #[serde(default)]
    speed: f64,
    #[serde(default)]
    direction: f64,
}

impl TrackResponse {
    fn into_coordinate(self) -> Result<Coordinate, InvalidCoordinate> {
        let coordinate = Coordinate {
            latitude: self.latitude,
            longitude: self.longitude,
            altitude: Some(self.altitude),
            speed: Some(self.speed),
            direction: Some(self.direction),
        };
        coordinate.validate()?;
        Ok(coordinate)
    }
}

/// Map a non-2xx status to the structured taxonomy. This is the only place
/// status codes are interpreted.
fn classify_status(status: StatusCode) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
        StatusCode::FORBIDDEN => ApiError::Forbidden,
        StatusCode::NOT_FOUND => ApiError::UserNotFound,
        status => ApiError::Api(status.as_u16()),
    }
}

/// Request-level failures (connect, timeout, TLS) never carry a status.
fn classify_transport_error(err: reqwest::Error) -> ApiError {
    match err.status() {
        Some(status) => classify_status(status),
        None => ApiError::Network(err.to_string()),
    }
}

/// [TrackApi] over the tracking service's HTTP endpoints, attaching the
/// session's bearer token to every call.
pub struct HttpTrackApi {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpTrackApi {
    /// Client against the build-time configured service location.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        Self::with_base_url(API_BASE_URL, token)
    }

    pub fn with_base_url(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            token: token.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl TrackApi for HttpTrackApi {
    async fn publish_track(&self, reading: &LocationReading) -> std::result::Result<(), ApiError> {
        let body = TrackUpdateRequest::from(reading);
        let response = self
            .client
            .put(self.url(TRACK_PATH))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status));
        }

        match response.json::<TrackUpdateResponse>().await {
            Ok(ack) => debug!("track update acknowledged: {}", ack.detail),
            Err(err) => warn!("track update acknowledged with unreadable body: {err}"),
        }
        Ok(())
    }

    async fn fetch_track(
        &self,
        subject_id: &str,
    ) -> std::result::Result<LocationReading, ApiError> {
        let response = self
            .client
            .get(self.url(&track_subject_path(subject_id)))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status));
        }

        let payload = response
            .json::<TrackResponse>()
            .await
            .map_err(|err| ApiError::Network(err.to_string()))?;
        let coordinate = payload.into_coordinate()?;
        Ok(LocationReading::now(coordinate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(
            classify_status(StatusCode::UNAUTHORIZED),
            ApiError::Unauthorized
        );
        assert_eq!(classify_status(StatusCode::FORBIDDEN), ApiError::Forbidden);
        assert_eq!(classify_status(StatusCode::NOT_FOUND), ApiError::UserNotFound);
        assert_eq!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR),
            ApiError::Api(500)
        );
        assert_eq!(
            classify_status(StatusCode::BAD_GATEWAY),
            ApiError::Api(502)
        );
    }

    #[test]
    fn test_report_body_defaults_unknowns_to_zero() {
        let reading = LocationReading::now(Coordinate::new(37.5665, 126.9780).unwrap());
        let body = serde_json::to_value(TrackUpdateRequest::from(&reading)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "latitude": 37.5665,
                "longitude": 126.978,
                "altitude": 0.0,
                "speed": 0.0,
                "direction": 0.0,
            })
        );
    }

    #[test]
    fn test_fetch_payload_parses_with_missing_optionals() {
        let payload: TrackResponse =
            serde_json::from_str(r#"{"latitude":37.5665,"longitude":126.978}"#).unwrap();
        let coordinate = payload.into_coordinate().unwrap();
        assert_eq!(coordinate.altitude, Some(0.0));
        assert_eq!(coordinate.speed, Some(0.0));
    }

    #[test]
    fn test_fetch_payload_rejects_out_of_range() {
        let payload: TrackResponse =
            serde_json::from_str(r#"{"latitude":240.0,"longitude":0.0}"#).unwrap();
        assert!(payload.into_coordinate().is_err());
    }

    #[test]
    fn test_full_payload_round_trip() {
        let payload: TrackResponse = serde_json::from_str(
            r#"{"latitude":37.5665,"longitude":126.978,"altitude":32.1,"speed":1.4,"direction":270.0}"#,
        )
        .unwrap();
        let coordinate = payload.into_coordinate().unwrap();
        assert_eq!(coordinate.direction, Some(270.0));
    }
}
