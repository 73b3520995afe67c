//! Application state management

use crate::config::ApiConfig;
use fleet_routing::RoadRouter;
use fleet_telemetry::MetricsCollector;
use fleet_tracker::{FleetTracker, LocationRegistry};

use anyhow::Context;
use std::sync::Arc;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration
    pub config: ApiConfig,
    /// Location catalog plus per-vehicle tracking
    pub tracker: Arc<FleetTracker>,
    /// Road routing with straight-line fallback
    pub router: Arc<RoadRouter>,
    /// Prometheus metrics
    pub metrics: Arc<MetricsCollector>,
}

impl AppState {
    /// Create application state around an already loaded catalog
    pub fn new(config: ApiConfig, registry: LocationRegistry) -> anyhow::Result<Self> {
        let registry = Arc::new(registry);
        let tracker = Arc::new(FleetTracker::new(config.tracker_config(), registry));

        let router = RoadRouter::osrm(config.router_config())
            .context("Failed to initialize routing client")?;
        info!("Routing via {}", config.osrm_base_url);

        let metrics = MetricsCollector::new().context("Failed to register metrics")?;

        let state = Self {
            config,
            tracker,
            router: Arc::new(router),
            metrics: Arc::new(metrics),
        };
        state.refresh_gauges();

        Ok(state)
    }

    pub fn registry(&self) -> &LocationRegistry {
        self.tracker.registry()
    }

    /// Sync catalog and vehicle gauges with current state
    pub fn refresh_gauges(&self) {
        self.metrics.set_locations_active(self.registry().len());
        self.metrics.set_vehicles_tracked(self.tracker.vehicle_count());
    }
}

/// Load the location catalog from `LOCATIONS_FILE`, or the embedded default
pub fn load_registry(config: &ApiConfig) -> anyhow::Result<LocationRegistry> {
    let registry = match &config.locations_file {
        Some(path) => LocationRegistry::load_file(path)
            .with_context(|| format!("Failed to load location catalog {}", path.display()))?,
        None => LocationRegistry::embedded().context("Failed to load embedded location catalog")?,
    };

    info!("Loaded {} locations", registry.len());
    Ok(registry)
}
