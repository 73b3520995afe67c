//! Road routing service abstraction and the OSRM HTTP client

use crate::error::{RoutingError, RoutingResult};
use fleet_core::GeoPosition;

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Public OSRM demo server
pub const DEFAULT_OSRM_BASE_URL: &str = "https://router.project-osrm.org";

/// OSRM `/route` response body
#[derive(Debug, Clone, Deserialize)]
pub struct OsrmResponse {
    pub code: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub routes: Vec<OsrmRoute>,
    #[serde(default)]
    pub waypoints: Vec<OsrmWaypoint>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OsrmRoute {
    /// Meters
    pub distance: f64,
    /// Seconds
    pub duration: f64,
    #[serde(default)]
    pub geometry: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OsrmWaypoint {
    #[serde(default)]
    pub name: String,
    /// `[lon, lat]`
    pub location: [f64; 2],
    /// Snap distance in meters
    #[serde(default)]
    pub distance: f64,
}

/// A road-network routing backend.
///
/// Implementations make exactly one request per call and report any failure
/// as a [`RoutingError`]; the router decides what to do with it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RouteService: Send + Sync {
    async fn route(&self, waypoints: &[GeoPosition]) -> RoutingResult<OsrmResponse>;
}

/// Build the OSRM driving route URL for an ordered waypoint list
pub fn route_url(base_url: &str, waypoints: &[GeoPosition]) -> String {
    let coordinates = waypoints
        .iter()
        .map(|p| format!("{},{}", p.longitude, p.latitude))
        .collect::<Vec<_>>()
        .join(";");

    format!(
        "{}/route/v1/driving/{}?overview=simplified&geometries=polyline",
        base_url.trim_end_matches('/'),
        coordinates
    )
}

/// OSRM client over reqwest
pub struct OsrmClient {
    client: reqwest::Client,
    base_url: String,
}

impl OsrmClient {
    /// Creates a client against `base_url` with a request timeout
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> RoutingResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RoutingError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl RouteService for OsrmClient {
    async fn route(&self, waypoints: &[GeoPosition]) -> RoutingResult<OsrmResponse> {
        let url = route_url(&self.base_url, waypoints);
        debug!("Requesting road route: {}", url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(RoutingError::Status(response.status().as_u16()));
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| RoutingError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_url_uses_lon_lat_order() {
        let url = route_url(
            "https://osrm.example.com/",
            &[GeoPosition::new(-20.14704, 28.56973), GeoPosition::new(-19.18135, 32.69949)],
        );

        assert_eq!(
            url,
            "https://osrm.example.com/route/v1/driving/28.56973,-20.14704;32.69949,-19.18135\
             ?overview=simplified&geometries=polyline"
        );
    }

    #[test]
    fn test_response_parsing() {
        let json = r#"{
            "code": "Ok",
            "routes": [{ "distance": 452310.4, "duration": 19544.2, "geometry": "_p~iF~ps|U" }],
            "waypoints": [
                { "name": "A5", "location": [28.569, -20.147], "distance": 12.3 },
                { "location": [32.699, -19.181] }
            ]
        }"#;

        let response: OsrmResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.code, "Ok");
        assert_eq!(response.routes.len(), 1);
        assert_eq!(response.waypoints[1].name, "");
        assert_eq!(response.waypoints[1].distance, 0.0);
    }

    #[test]
    fn test_error_response_parsing() {
        let json = r#"{ "code": "NoRoute", "message": "Impossible route between points" }"#;
        let response: OsrmResponse = serde_json::from_str(json).unwrap();
        assert!(response.routes.is_empty());
        assert_eq!(response.message.as_deref(), Some("Impossible route between points"));
    }

    #[test]
    fn test_client_creation() {
        let client = OsrmClient::new(DEFAULT_OSRM_BASE_URL, Duration::from_secs(5));
        assert!(client.is_ok());
    }
}
