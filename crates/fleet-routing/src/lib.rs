//! # Fleet Routing
//!
//! Road-network distance and duration between ordered waypoints.
//!
//! Requests go to an OSRM-compatible service. When the service is slow,
//! unreachable or has no route, [`RoadRouter::calculate_route`] still answers
//! with a straight-line estimate: the Haversine sum of consecutive legs
//! multiplied by a road factor, driven at a fixed fallback speed.

pub mod client;
pub mod error;
pub mod polyline;

pub use client::{route_url, OsrmClient, OsrmResponse, OsrmRoute, OsrmWaypoint, RouteService};
pub use error::{RoutingError, RoutingResult};
pub use polyline::{decode_polyline, encode_polyline};

use fleet_core::GeoPosition;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Multiplier applied to straight-line distance to approximate road distance
pub const ROAD_FACTOR: f64 = 1.3;

/// Speed assumed for straight-line duration estimates
pub const FALLBACK_SPEED_KMH: f64 = 60.0;

/// Router configuration
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub road_factor: f64,
    pub fallback_speed_kmh: f64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            base_url: client::DEFAULT_OSRM_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
            road_factor: ROAD_FACTOR,
            fallback_speed_kmh: FALLBACK_SPEED_KMH,
        }
    }
}

/// Where a route's numbers came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteSource {
    Road,
    StraightLine,
}

/// A waypoint as snapped onto the road network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnappedWaypoint {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Distance from the requested point to the snapped point (meters)
    pub distance_m: f64,
}

/// Outcome of a route calculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResult {
    pub distance_km: f64,
    pub duration_minutes: i64,
    /// Decoded `[lat, lon]` pairs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Vec<[f64; 2]>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waypoints: Option<Vec<SnappedWaypoint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub source: RouteSource,
}

impl RouteResult {
    pub fn is_fallback(&self) -> bool {
        self.source == RouteSource::StraightLine
    }
}

/// Sum of Haversine legs between consecutive waypoints
pub fn straight_line_distance_km(waypoints: &[GeoPosition]) -> f64 {
    waypoints.windows(2).map(|leg| leg[0].distance_to(&leg[1])).sum()
}

/// Straight-line estimate with the road factor applied
pub fn straight_line_route(
    waypoints: &[GeoPosition],
    road_factor: f64,
    speed_kmh: f64,
    error: impl Into<String>,
) -> RouteResult {
    let distance_km = straight_line_distance_km(waypoints) * road_factor;
    let duration_minutes = if speed_kmh > 0.0 {
        (distance_km / speed_kmh * 60.0).round() as i64
    } else {
        0
    };

    RouteResult {
        distance_km,
        duration_minutes,
        geometry: None,
        waypoints: None,
        error: Some(error.into()),
        source: RouteSource::StraightLine,
    }
}

/// Road router with straight-line fallback
pub struct RoadRouter<S = OsrmClient> {
    service: S,
    config: RouterConfig,
}

impl RoadRouter<OsrmClient> {
    /// Router backed by an OSRM server at `config.base_url`
    pub fn osrm(config: RouterConfig) -> RoutingResult<Self> {
        let service = OsrmClient::new(config.base_url.clone(), config.timeout)?;
        Ok(Self { service, config })
    }
}

impl<S: RouteService> RoadRouter<S> {
    pub fn with_service(service: S, config: RouterConfig) -> Self {
        Self { service, config }
    }

    /// Route through `waypoints` in order.
    ///
    /// Never fails: any routing error is reported in `RouteResult::error`
    /// with `source = StraightLine`. Fewer than two waypoints yields a zero
    /// result without contacting the service.
    pub async fn calculate_route(&self, waypoints: &[GeoPosition]) -> RouteResult {
        if waypoints.len() < 2 {
            return RouteResult {
                distance_km: 0.0,
                duration_minutes: 0,
                geometry: None,
                waypoints: None,
                error: Some(RoutingError::InsufficientWaypoints(waypoints.len()).to_string()),
                source: RouteSource::StraightLine,
            };
        }

        match self.fetch_road_route(waypoints).await {
            Ok(result) => {
                debug!(
                    "Road route: {:.1} km, {} min over {} waypoints",
                    result.distance_km,
                    result.duration_minutes,
                    waypoints.len()
                );
                result
            }
            Err(e) => {
                warn!("Road routing failed, using straight-line estimate: {}", e);
                straight_line_route(
                    waypoints,
                    self.config.road_factor,
                    self.config.fallback_speed_kmh,
                    e.to_string(),
                )
            }
        }
    }

    async fn fetch_road_route(&self, waypoints: &[GeoPosition]) -> RoutingResult<RouteResult> {
        let response = tokio::time::timeout(self.config.timeout, self.service.route(waypoints))
            .await
            .map_err(|_| RoutingError::Timeout(self.config.timeout))??;

        if response.code != "Ok" {
            return Err(RoutingError::NoRoute(
                response.message.unwrap_or(response.code),
            ));
        }

        let route = response
            .routes
            .first()
            .ok_or_else(|| RoutingError::NoRoute("response contained no routes".to_string()))?;

        let snapped = response
            .waypoints
            .iter()
            .map(|w| SnappedWaypoint {
                name: w.name.clone(),
                latitude: w.location[1],
                longitude: w.location[0],
                distance_m: w.distance,
            })
            .collect::<Vec<_>>();

        Ok(RouteResult {
            distance_km: route.distance / 1000.0,
            duration_minutes: (route.duration / 60.0).round() as i64,
            geometry: route.geometry.as_deref().map(decode_polyline),
            waypoints: (!snapped.is_empty()).then_some(snapped),
            error: None,
            source: RouteSource::Road,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockRouteService;
    use async_trait::async_trait;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    fn depots() -> Vec<GeoPosition> {
        vec![
            GeoPosition::new(-20.14704, 28.56973),
            GeoPosition::new(-19.18135, 32.69949),
        ]
    }

    fn ok_response() -> OsrmResponse {
        OsrmResponse {
            code: "Ok".to_string(),
            message: None,
            routes: vec![OsrmRoute {
                distance: 512_340.0,
                duration: 21_630.0,
                geometry: Some("_p~iF~ps|U_ulLnnqC_mqNvxq`@".to_string()),
            }],
            waypoints: vec![
                OsrmWaypoint {
                    name: "A5".to_string(),
                    location: [28.5697, -20.1470],
                    distance: 14.2,
                },
                OsrmWaypoint {
                    name: "A3".to_string(),
                    location: [32.6995, -19.1813],
                    distance: 3.8,
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_road_route_conversion() {
        let mut service = MockRouteService::new();
        service
            .expect_route()
            .withf(|w| w.len() == 2)
            .times(1)
            .returning(|_| Ok(ok_response()));

        let router = RoadRouter::with_service(service, RouterConfig::default());
        let result = router.calculate_route(&depots()).await;

        assert_eq!(result.source, RouteSource::Road);
        assert!((result.distance_km - 512.34).abs() < 1e-9);
        assert_eq!(result.duration_minutes, 361);
        assert!(result.error.is_none());
        assert_eq!(result.geometry.as_ref().map(Vec::len), Some(3));

        let waypoints = result.waypoints.unwrap();
        assert_eq!(waypoints[0].name, "A5");
        assert!((waypoints[0].latitude + 20.1470).abs() < 1e-9);
        assert!((waypoints[0].longitude - 28.5697).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_insufficient_waypoints_skips_service() {
        let mut service = MockRouteService::new();
        service.expect_route().times(0);

        let router = RoadRouter::with_service(service, RouterConfig::default());
        let result = router.calculate_route(&depots()[..1]).await;

        assert_eq!(result.distance_km, 0.0);
        assert_eq!(result.duration_minutes, 0);
        assert!(result.error.unwrap().contains("At least 2 waypoints"));
    }

    #[tokio::test]
    async fn test_service_error_falls_back_to_straight_line() {
        let mut service = MockRouteService::new();
        service
            .expect_route()
            .times(1)
            .returning(|_| Err(RoutingError::Status(503)));

        let router = RoadRouter::with_service(service, RouterConfig::default());
        let waypoints = depots();
        let result = router.calculate_route(&waypoints).await;

        let expected = straight_line_distance_km(&waypoints) * ROAD_FACTOR;
        assert!(result.is_fallback());
        assert!((result.distance_km - expected).abs() < 1e-9);
        assert_eq!(result.duration_minutes, expected.round() as i64);
        assert!(result.error.unwrap().contains("503"));
        assert!(result.geometry.is_none());
    }

    #[tokio::test]
    async fn test_no_route_code_falls_back() {
        let mut service = MockRouteService::new();
        service.expect_route().returning(|_| {
            Ok(OsrmResponse {
                code: "NoRoute".to_string(),
                message: Some("Impossible route between points".to_string()),
                routes: vec![],
                waypoints: vec![],
            })
        });

        let router = RoadRouter::with_service(service, RouterConfig::default());
        let result = router.calculate_route(&depots()).await;

        assert!(result.is_fallback());
        assert!(result.error.unwrap().contains("Impossible route"));
    }

    #[tokio::test]
    async fn test_empty_routes_fall_back() {
        let mut service = MockRouteService::new();
        service.expect_route().returning(|_| {
            Ok(OsrmResponse {
                code: "Ok".to_string(),
                message: None,
                routes: vec![],
                waypoints: vec![],
            })
        });

        let router = RoadRouter::with_service(service, RouterConfig::default());
        let result = router.calculate_route(&depots()).await;

        assert!(result.is_fallback());
        assert!(result.distance_km > 0.0);
    }

    struct SlowService;

    #[async_trait]
    impl RouteService for SlowService {
        async fn route(&self, _waypoints: &[GeoPosition]) -> RoutingResult<OsrmResponse> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(ok_response())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_falls_back() {
        let config = RouterConfig {
            timeout: Duration::from_secs(2),
            ..RouterConfig::default()
        };
        let router = RoadRouter::with_service(SlowService, config);
        let result = router.calculate_route(&depots()).await;

        assert!(result.is_fallback());
        assert!(result.error.unwrap().contains("timed out"));
    }

    #[test]
    fn test_straight_line_multi_leg() {
        let a = GeoPosition::new(-17.8292, 31.0522);
        let b = GeoPosition::new(-18.9707, 32.6709);
        let c = GeoPosition::new(-19.1814, 32.6995);

        let total = straight_line_distance_km(&[a, b, c]);
        assert!((total - (a.distance_to(&b) + b.distance_to(&c))).abs() < 1e-9);
        assert_eq!(straight_line_distance_km(&[a]), 0.0);
    }

    #[test]
    fn test_route_result_serialization() {
        let result = straight_line_route(&depots(), ROAD_FACTOR, FALLBACK_SPEED_KMH, "offline");
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["source"], "straight_line");
        assert_eq!(json["error"], "offline");
        assert!(json.get("geometry").is_none());
    }

    /// Answer a single HTTP request on a local port with a canned response.
    /// The handle yields the request line that was received.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;

            String::from_utf8_lossy(&request)
                .lines()
                .next()
                .unwrap_or_default()
                .to_string()
        });

        (format!("http://{addr}"), handle)
    }

    fn osrm_router(base_url: String) -> RoadRouter {
        RoadRouter::osrm(RouterConfig {
            base_url,
            timeout: Duration::from_secs(5),
            ..RouterConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_osrm_server_error_falls_back() {
        let (base_url, server) = serve_once("503 Service Unavailable", r#"{"code":"Busy"}"#).await;
        let router = osrm_router(base_url);

        let result = router.calculate_route(&depots()).await;

        assert_eq!(result.source, RouteSource::StraightLine);
        assert!(result.error.unwrap().contains("HTTP 503"));

        let request_line = server.await.unwrap();
        assert!(request_line.starts_with(
            "GET /route/v1/driving/28.56973,-20.14704;32.69949,-19.18135?overview=simplified"
        ));
    }

    #[tokio::test]
    async fn test_osrm_malformed_body_falls_back() {
        let (base_url, server) = serve_once("200 OK", "<html>not a route</html>").await;
        let router = osrm_router(base_url);

        let result = router.calculate_route(&depots()).await;

        assert_eq!(result.source, RouteSource::StraightLine);
        assert!(result.error.unwrap().contains("Malformed routing response"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_osrm_route_over_http() {
        let body = r#"{
            "code": "Ok",
            "routes": [{ "distance": 512340.0, "duration": 21630.0 }],
            "waypoints": [
                { "name": "A5", "location": [28.5697, -20.147], "distance": 14.2 },
                { "name": "A3", "location": [32.6995, -19.1813], "distance": 3.8 }
            ]
        }"#;
        let (base_url, server) = serve_once("200 OK", body).await;
        let router = osrm_router(base_url);

        let result = router.calculate_route(&depots()).await;

        assert_eq!(result.source, RouteSource::Road);
        assert!((result.distance_km - 512.34).abs() < 1e-9);
        assert_eq!(result.duration_minutes, 361);
        assert!(result.geometry.is_none());
        assert_eq!(result.waypoints.unwrap().len(), 2);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_osrm_unreachable_falls_back() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let router = osrm_router(format!("http://{addr}"));
        let result = router.calculate_route(&depots()).await;

        assert!(result.is_fallback());
        assert!(result.error.unwrap().contains("Routing request failed"));
    }
}
