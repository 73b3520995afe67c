//! # Fleet Telemetry - Metrics
//!
//! Prometheus metrics for the fleet tracking engine:
//! - Location catalog size and tracked vehicles
//! - Geofence transitions and progress computations
//! - Road routing outcomes and latency
//! - API traffic

use fleet_core::GeofenceEventType;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use tracing::{info, warn};

/// Metrics collector for the fleet tracking engine
pub struct MetricsCollector {
    registry: Registry,

    // Catalog and tracker
    locations_active: IntGauge,
    vehicles_tracked: IntGauge,
    geofence_events: IntCounterVec,
    progress_computations: IntCounter,

    // Routing
    route_requests: IntCounterVec,
    route_duration: HistogramVec,

    // API
    api_requests_total: IntCounterVec,
    api_request_duration: HistogramVec,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let locations_active = IntGauge::new(
            "fleet_locations_active",
            "Active locations in the catalog",
        )?;
        registry.register(Box::new(locations_active.clone()))?;

        let vehicles_tracked = IntGauge::new(
            "fleet_vehicles_tracked",
            "Vehicles with a known position",
        )?;
        registry.register(Box::new(vehicles_tracked.clone()))?;

        let geofence_events = IntCounterVec::new(
            Opts::new("fleet_geofence_events_total", "Geofence transitions detected"),
            &["event_type"],
        )?;
        registry.register(Box::new(geofence_events.clone()))?;

        let progress_computations = IntCounter::new(
            "fleet_progress_computations_total",
            "Trip progress computations",
        )?;
        registry.register(Box::new(progress_computations.clone()))?;

        let route_requests = IntCounterVec::new(
            Opts::new("fleet_route_requests_total", "Route calculations by result source"),
            &["source"],
        )?;
        registry.register(Box::new(route_requests.clone()))?;

        let route_duration = HistogramVec::new(
            HistogramOpts::new(
                "fleet_route_duration_seconds",
                "Route calculation latency",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["source"],
        )?;
        registry.register(Box::new(route_duration.clone()))?;

        let api_requests_total = IntCounterVec::new(
            Opts::new("fleet_api_requests_total", "API requests"),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(api_requests_total.clone()))?;

        let api_request_duration = HistogramVec::new(
            HistogramOpts::new(
                "fleet_api_request_duration_seconds",
                "API request duration",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["method", "path"],
        )?;
        registry.register(Box::new(api_request_duration.clone()))?;

        info!("Metrics collector initialized");

        Ok(Self {
            registry,
            locations_active,
            vehicles_tracked,
            geofence_events,
            progress_computations,
            route_requests,
            route_duration,
            api_requests_total,
            api_request_duration,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Export metrics in Prometheus text format
    pub fn export(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            warn!("Failed to encode metrics: {}", e);
        }
        String::from_utf8(buffer).unwrap_or_default()
    }

    // ========================================================================
    // TRACKER METRICS
    // ========================================================================

    pub fn set_locations_active(&self, count: usize) {
        self.locations_active.set(count as i64);
    }

    pub fn set_vehicles_tracked(&self, count: usize) {
        self.vehicles_tracked.set(count as i64);
    }

    /// Record a detected geofence transition
    pub fn record_geofence_event(&self, event_type: GeofenceEventType) {
        let label = match event_type {
            GeofenceEventType::Entry => "entry",
            GeofenceEventType::Exit => "exit",
        };
        self.geofence_events.with_label_values(&[label]).inc();
    }

    pub fn record_progress_computation(&self) {
        self.progress_computations.inc();
    }

    // ========================================================================
    // ROUTING METRICS
    // ========================================================================

    /// Record a finished route calculation, labelled `road` or `straight_line`
    pub fn record_route(&self, source: &str, duration_secs: f64) {
        self.route_requests.with_label_values(&[source]).inc();
        self.route_duration
            .with_label_values(&[source])
            .observe(duration_secs);
    }

    // ========================================================================
    // API METRICS
    // ========================================================================

    pub fn record_api_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        self.api_requests_total
            .with_label_values(&[method, path, &status.to_string()])
            .inc();
        self.api_request_duration
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create MetricsCollector")
    }
}

// ============================================================================
// TESTS
// ============================================================================
