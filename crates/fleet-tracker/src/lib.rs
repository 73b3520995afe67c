//! # Fleet Tracker
//!
//! Trip progress, geofence and ETA engine for the fleet tracking system.
//!
//! ## Features
//! - Location registry with fuzzy name resolution and nearest lookup
//! - Geofence entry/exit detection between consecutive samples
//! - Origin/destination progress with destination-proximity correction
//! - ETA from remaining distance and reported speed
//! - Per-vehicle state so callers only need to push samples

pub mod eta;
pub mod events;
pub mod geofence;
pub mod progress;
pub mod registry;

pub use eta::{EtaEstimate, calculate_eta, calculate_eta_at};
pub use events::EventBus;
pub use geofence::{detect_geofence_event, is_within_geofence, locations_containing};
pub use progress::{compute_trip_progress, compute_trip_progress_by_name, estimate_progress};
pub use registry::LocationRegistry;

use fleet_core::{
    CoreError, CoreResult, Event, GeofenceEvent, LocationId, PositionSample, TripProgress,
    VehicleId, heading_to_compass,
};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Tracker configuration
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Broadcast channel capacity
    pub event_capacity: usize,
    /// Events kept for replay
    pub event_history: usize,
    /// Vehicles silent for longer than this are reported stale
    pub stale_after: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            event_capacity: 1024,
            event_history: 1000,
            stale_after: Duration::from_secs(15 * 60),
        }
    }
}

/// Origin and destination assigned to a vehicle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TripAssignment {
    pub origin: LocationId,
    pub destination: LocationId,
}

/// State retained per vehicle between samples
#[derive(Debug, Clone, Serialize)]
pub struct TrackedVehicle {
    pub vehicle_id: VehicleId,
    pub last_sample: Option<PositionSample>,
    pub trip: Option<TripAssignment>,
    pub last_progress: Option<TripProgress>,
    pub last_update: DateTime<Utc>,
}

impl TrackedVehicle {
    pub fn new(vehicle_id: VehicleId) -> Self {
        Self {
            vehicle_id,
            last_sample: None,
            trip: None,
            last_progress: None,
            last_update: Utc::now(),
        }
    }

    /// Check if vehicle is stale (no updates)
    pub fn is_stale(&self, timeout: Duration) -> bool {
        Utc::now().signed_duration_since(self.last_update)
            > chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::days(365))
    }
}

/// Result of feeding one sample to the tracker
#[derive(Debug, Clone, Serialize)]
pub struct VehicleUpdate {
    pub vehicle_id: VehicleId,
    pub geofence_event: Option<GeofenceEvent>,
    pub progress: Option<TripProgress>,
    pub eta: Option<EtaEstimate>,
    /// Eight-point label for the reported heading
    pub compass_heading: Option<&'static str>,
}

/// Stateful front for the live-tracking display.
///
/// Remembers each vehicle's previous sample so geofence transitions can be
/// detected from a plain stream of position updates.
pub struct FleetTracker {
    config: TrackerConfig,
    registry: Arc<LocationRegistry>,
    vehicles: Arc<DashMap<VehicleId, TrackedVehicle>>,
    bus: EventBus,
}

impl FleetTracker {
    pub fn new(config: TrackerConfig, registry: Arc<LocationRegistry>) -> Self {
        info!("Fleet tracker initialized with {} locations", registry.len());
        let bus = EventBus::new(config.event_capacity, config.event_history);

        Self {
            config,
            registry,
            vehicles: Arc::new(DashMap::new()),
            bus,
        }
    }

    pub fn registry(&self) -> &Arc<LocationRegistry> {
        &self.registry
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Assign an origin/destination trip to a vehicle
    pub fn assign_trip(
        &self,
        vehicle_id: &VehicleId,
        origin: LocationId,
        destination: LocationId,
    ) -> CoreResult<()> {
        for id in [&origin, &destination] {
            if self.registry.get(id).is_none() {
                return Err(CoreError::location_not_found(id.0.clone()));
            }
        }

        info!("Trip assigned to {}: {} -> {}", vehicle_id, origin, destination);
        let mut vehicle = self
            .vehicles
            .entry(vehicle_id.clone())
            .or_insert_with(|| TrackedVehicle::new(vehicle_id.clone()));
        vehicle.trip = Some(TripAssignment {
            origin,
            destination,
        });
        vehicle.last_progress = None;
        Ok(())
    }

    /// Remove a vehicle's trip; geofence tracking continues
    pub fn clear_trip(&self, vehicle_id: &VehicleId) -> bool {
        match self.vehicles.get_mut(vehicle_id) {
            Some(mut vehicle) => {
                vehicle.last_progress = None;
                vehicle.trip.take().is_some()
            }
            None => false,
        }
    }

    /// Drop all state for a vehicle
    pub fn forget_vehicle(&self, vehicle_id: &VehicleId) -> bool {
        self.vehicles.remove(vehicle_id).is_some()
    }

    /// Feed a new position sample for a vehicle
    pub fn update_position(
        &self,
        vehicle_id: &VehicleId,
        sample: PositionSample,
    ) -> CoreResult<VehicleUpdate> {
        let position = sample.position();
        if !position.is_valid() {
            return Err(CoreError::invalid_position(sample.latitude, sample.longitude));
        }

        let mut vehicle = self
            .vehicles
            .entry(vehicle_id.clone())
            .or_insert_with(|| TrackedVehicle::new(vehicle_id.clone()));

        let previous = vehicle.last_sample.as_ref().map(PositionSample::position);
        let geofence_event =
            detect_geofence_event(&self.registry, previous, position, sample.timestamp);

        let progress = vehicle.trip.as_ref().and_then(|trip| {
            let origin = self.registry.get(&trip.origin);
            let destination = self.registry.get(&trip.destination);
            match (origin, destination) {
                (Some(origin), Some(destination)) => Some(compute_trip_progress(
                    &self.registry,
                    &origin,
                    &destination,
                    position.latitude,
                    position.longitude,
                )),
                _ => {
                    warn!("Trip locations for {} no longer in catalog", vehicle_id);
                    None
                }
            }
        });

        let eta = progress
            .as_ref()
            .map(|p| calculate_eta(p.distance_remaining_km, sample.speed_kmh));
        let compass_heading = sample
            .heading_degrees
            .filter(|h| h.is_finite())
            .map(heading_to_compass);

        vehicle.last_sample = Some(sample.clone());
        vehicle.last_progress = progress.clone();
        vehicle.last_update = Utc::now();
        drop(vehicle);

        self.bus
            .publish(Event::vehicle_position_updated(vehicle_id.clone(), sample));
        if let Some(event) = &geofence_event {
            info!(
                "{} {:?} geofence {}",
                vehicle_id, event.event_type, event.location_name
            );
            self.bus.publish(Event::geofence(vehicle_id.clone(), event.clone()));
        }
        if let Some(progress) = &progress {
            self.bus
                .publish(Event::trip_progress(vehicle_id.clone(), progress.clone()));
        }

        debug!("Processed update for vehicle {}", vehicle_id);

        Ok(VehicleUpdate {
            vehicle_id: vehicle_id.clone(),
            geofence_event,
            progress,
            eta,
            compass_heading,
        })
    }

    pub fn get_vehicle(&self, vehicle_id: &VehicleId) -> Option<TrackedVehicle> {
        self.vehicles.get(vehicle_id).map(|v| v.value().clone())
    }

    pub fn get_all_vehicles(&self) -> Vec<TrackedVehicle> {
        self.vehicles.iter().map(|r| r.value().clone()).collect()
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    /// Vehicles with no update within the configured window
    pub fn stale_vehicles(&self) -> Vec<TrackedVehicle> {
        self.vehicles
            .iter()
            .filter(|v| v.is_stale(self.config.stale_after))
            .map(|v| v.value().clone())
            .collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::{EventType, GeofenceEventType, Location};

    fn tracker() -> FleetTracker {
        let registry = LocationRegistry::from_locations(vec![
            Location::new("DEP-A", "Depot A", -20.14704, 28.56973).with_radius(500.0),
            Location::new("DEP-B", "Depot B", -19.18135, 32.69949).with_radius(500.0),
        ])
        .unwrap();
        FleetTracker::new(TrackerConfig::default(), Arc::new(registry))
    }

    fn vehicle() -> VehicleId {
        VehicleId::new("TRK-01")
    }

    #[test]
    fn test_first_sample_has_no_event() {
        let tracker = tracker();
        let update = tracker
            .update_position(&vehicle(), PositionSample::new(-20.14704, 28.56973))
            .unwrap();

        assert!(update.geofence_event.is_none());
        assert!(update.progress.is_none());
        assert_eq!(tracker.vehicle_count(), 1);
    }

    #[test]
    fn test_exit_then_reentry() {
        let tracker = tracker();
        let inside = PositionSample::new(-20.14704, 28.56973);
        let outside = PositionSample::new(-20.16, 28.59);

        tracker.update_position(&vehicle(), inside.clone()).unwrap();
        let exit = tracker.update_position(&vehicle(), outside).unwrap();
        let entry = tracker.update_position(&vehicle(), inside).unwrap();

        let exit = exit.geofence_event.unwrap();
        let entry = entry.geofence_event.unwrap();
        assert_eq!(exit.event_type, GeofenceEventType::Exit);
        assert_eq!(entry.event_type, GeofenceEventType::Entry);
        assert_eq!(exit.location_id, entry.location_id);
        assert_eq!(exit.location_id.as_str(), "DEP-A");

        let history = tracker.bus().recent_geofence_events(&vehicle(), 10);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_trip_progress_and_eta() {
        let tracker = tracker();
        tracker
            .assign_trip(&vehicle(), LocationId::new("DEP-A"), LocationId::new("DEP-B"))
            .unwrap();

        let update = tracker
            .update_position(&vehicle(), PositionSample::new(-20.14704, 28.56973).with_speed(4.0))
            .unwrap();

        let progress = update.progress.unwrap();
        assert_eq!(progress.progress_percent, 0);
        assert!(progress.is_at_origin);

        let eta = update.eta.unwrap();
        assert!(eta.used_default_speed);
        assert_eq!(
            eta.duration_minutes,
            (progress.distance_remaining_km / 60.0 * 60.0).round() as i64
        );
    }

    #[test]
    fn test_assign_unknown_location() {
        let tracker = tracker();
        let result = tracker.assign_trip(&vehicle(), LocationId::new("DEP-A"), LocationId::new("NOPE"));
        assert!(matches!(result, Err(CoreError::LocationNotFound(_))));
    }

    #[test]
    fn test_invalid_sample_rejected() {
        let tracker = tracker();
        let result = tracker.update_position(&vehicle(), PositionSample::new(95.0, 28.0));
        assert!(matches!(result, Err(CoreError::InvalidPosition { .. })));
        assert_eq!(tracker.vehicle_count(), 0);
    }

    #[test]
    fn test_clear_trip_and_forget() {
        let tracker = tracker();
        tracker
            .assign_trip(&vehicle(), LocationId::new("DEP-A"), LocationId::new("DEP-B"))
            .unwrap();

        assert!(tracker.clear_trip(&vehicle()));
        assert!(!tracker.clear_trip(&vehicle()));
        assert!(tracker.get_vehicle(&vehicle()).unwrap().trip.is_none());

        assert!(tracker.forget_vehicle(&vehicle()));
        assert!(tracker.get_vehicle(&vehicle()).is_none());
    }

    #[test]
    fn test_no_stale_vehicles_after_update() {
        let tracker = tracker();
        tracker
            .update_position(&vehicle(), PositionSample::new(-19.5, 30.0))
            .unwrap();
        assert!(tracker.stale_vehicles().is_empty());
    }

    #[test]
    fn test_silent_vehicle_reported_stale() {
        let tracker = tracker();
        let quiet = VehicleId::new("TRK-02");
        tracker
            .update_position(&vehicle(), PositionSample::new(-19.5, 30.0))
            .unwrap();
        tracker
            .update_position(&quiet, PositionSample::new(-19.6, 30.1))
            .unwrap();

        tracker.vehicles.get_mut(&quiet).unwrap().last_update =
            Utc::now() - chrono::Duration::minutes(16);

        let stale = tracker.stale_vehicles();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].vehicle_id, quiet);

        tracker
            .update_position(&quiet, PositionSample::new(-19.6, 30.1))
            .unwrap();
        assert!(tracker.stale_vehicles().is_empty());
    }

    #[test]
    fn test_update_reports_compass_heading() {
        let tracker = tracker();
        let update = tracker
            .update_position(&vehicle(), PositionSample::new(-19.5, 30.0).with_heading(100.0))
            .unwrap();
        assert_eq!(update.compass_heading, Some("E"));

        let update = tracker
            .update_position(&vehicle(), PositionSample::new(-19.5, 30.0))
            .unwrap();
        assert!(update.compass_heading.is_none());
    }

    #[tokio::test]
    async fn test_events_are_broadcast() {
        let tracker = tracker();
        let mut rx = tracker.subscribe();

        tracker
            .update_position(&vehicle(), PositionSample::new(-20.14704, 28.56973))
            .unwrap();
        tracker
            .update_position(&vehicle(), PositionSample::new(-20.16, 28.59))
            .unwrap();

        let mut types = Vec::new();
        while let Ok(event) = rx.try_recv() {
            types.push(event.event_type);
        }
        assert_eq!(
            types,
            vec![
                EventType::VehiclePositionUpdated,
                EventType::VehiclePositionUpdated,
                EventType::GeofenceExited,
            ]
        );
    }
}
