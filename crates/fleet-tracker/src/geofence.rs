//! Geofence containment and entry/exit detection

use crate::registry::LocationRegistry;
use fleet_core::{GeoPosition, GeofenceEvent, Location, haversine_distance_km};

use chrono::{DateTime, Utc};

/// True iff the point lies within the location's circular geofence.
///
/// The boundary itself counts as inside.
pub fn is_within_geofence(lat: f64, lon: f64, location: &Location) -> bool {
    let distance_m = haversine_distance_km(lat, lon, location.latitude, location.longitude) * 1000.0;
    distance_m <= location.radius
}

/// First transition over `locations` in order, ignoring inactive entries
pub fn detect_transition(
    locations: &[Location],
    previous: GeoPosition,
    current: GeoPosition,
    timestamp: DateTime<Utc>,
) -> Option<GeofenceEvent> {
    locations.iter().filter(|l| l.active).find_map(|location| {
        let was_inside = is_within_geofence(previous.latitude, previous.longitude, location);
        let is_inside = is_within_geofence(current.latitude, current.longitude, location);

        match (was_inside, is_inside) {
            (false, true) => Some(GeofenceEvent::entry(
                location,
                current.latitude,
                current.longitude,
                timestamp,
            )),
            (true, false) => Some(GeofenceEvent::exit(
                location,
                current.latitude,
                current.longitude,
                timestamp,
            )),
            _ => None,
        }
    })
}

/// Detect a geofence entry or exit between two consecutive samples.
///
/// Only the first transition in catalog order is reported. Without a
/// previous sample there is nothing to compare and `None` is returned.
pub fn detect_geofence_event(
    registry: &LocationRegistry,
    previous: Option<GeoPosition>,
    current: GeoPosition,
    timestamp: DateTime<Utc>,
) -> Option<GeofenceEvent> {
    let previous = previous?;
    registry.with_locations(|locations| detect_transition(locations, previous, current, timestamp))
}

/// Every active location whose geofence contains the point, in catalog order
pub fn locations_containing(registry: &LocationRegistry, lat: f64, lon: f64) -> Vec<Location> {
    registry.with_locations(|locations| {
        locations
            .iter()
            .filter(|l| l.active && is_within_geofence(lat, lon, l))
            .cloned()
            .collect()
    })
}

// ============================================================================
// TESTS
// ============================================================================
