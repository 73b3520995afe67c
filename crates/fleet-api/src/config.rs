//! API server configuration

use fleet_routing::RouterConfig;
use fleet_tracker::TrackerConfig;

use std::path::PathBuf;
use std::time::Duration;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// REST API port
    pub api_port: u16,
    /// Enable CORS for all origins (development)
    pub cors_permissive: bool,
    /// Allowed origin when CORS is not permissive
    pub cors_origin: String,
    /// Location catalog to load instead of the embedded one
    pub locations_file: Option<PathBuf>,
    /// OSRM-compatible routing service
    pub osrm_base_url: String,
    /// Per-request routing timeout
    pub routing_timeout_secs: u64,
    /// Events kept for `/api/v1/events/recent`
    pub event_history: usize,
    /// Silence after which a vehicle is listed by `/api/v1/vehicles/stale`
    pub stale_after_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_port: 3000,
            cors_permissive: true,
            cors_origin: "http://localhost:8080".into(),
            locations_file: None,
            osrm_base_url: fleet_routing::client::DEFAULT_OSRM_BASE_URL.into(),
            routing_timeout_secs: 10,
            event_history: 1000,
            stale_after_secs: 15 * 60,
        }
    }
}

impl ApiConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let api_port = std::env::var("API_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.api_port);

        let cors_permissive = std::env::var("CORS_PERMISSIVE")
            .map(|s| s == "true" || s == "1")
            .unwrap_or(defaults.cors_permissive);

        let cors_origin = std::env::var("CORS_ORIGIN").unwrap_or(defaults.cors_origin);

        let locations_file = std::env::var("LOCATIONS_FILE")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let osrm_base_url = std::env::var("OSRM_BASE_URL").unwrap_or(defaults.osrm_base_url);

        let routing_timeout_secs = std::env::var("ROUTING_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.routing_timeout_secs);

        let event_history = std::env::var("EVENT_HISTORY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.event_history);

        let stale_after_secs = std::env::var("STALE_AFTER_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.stale_after_secs);

        Self {
            api_port,
            cors_permissive,
            cors_origin,
            locations_file,
            osrm_base_url,
            routing_timeout_secs,
            event_history,
            stale_after_secs,
        }
    }

    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            base_url: self.osrm_base_url.clone(),
            timeout: Duration::from_secs(self.routing_timeout_secs),
            ..RouterConfig::default()
        }
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            event_history: self.event_history,
            stale_after: Duration::from_secs(self.stale_after_secs),
            ..TrackerConfig::default()
        }
    }
}
