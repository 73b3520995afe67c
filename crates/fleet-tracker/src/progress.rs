//! Trip progress estimation between an origin and a destination

use crate::geofence::is_within_geofence;
use crate::registry::LocationRegistry;
use fleet_core::{CoreError, CoreResult, Location, TripProgress, haversine_distance_km};

use tracing::debug;

/// Fraction of the route, measured back from the destination, inside which
/// progress is derived from the remaining distance instead of the traveled one
pub const DESTINATION_PROXIMITY_FRACTION: f64 = 0.2;

/// Percent complete for a point between origin and destination.
///
/// Distances are straight-line. Near the destination the remaining distance
/// drives the value, since a curving road makes distance-from-origin lag.
fn progress_percent(
    total_km: f64,
    from_origin_km: f64,
    to_destination_km: f64,
    is_at_origin: bool,
    is_at_destination: bool,
) -> u8 {
    if total_km == 0.0 {
        return 100;
    }
    if is_at_destination {
        return 100;
    }
    if is_at_origin {
        return 0;
    }

    let percent = if to_destination_km < total_km * DESTINATION_PROXIMITY_FRACTION {
        100.0 - to_destination_km / total_km * 100.0
    } else {
        from_origin_km / total_km * 100.0
    };

    if percent.is_finite() {
        percent.round().clamp(0.0, 100.0) as u8
    } else {
        0
    }
}

/// Progress of a position along origin → destination, without nearest-location lookup
pub fn estimate_progress(
    origin: &Location,
    destination: &Location,
    current_lat: f64,
    current_lon: f64,
) -> TripProgress {
    let total = haversine_distance_km(
        origin.latitude,
        origin.longitude,
        destination.latitude,
        destination.longitude,
    );
    let from_origin = haversine_distance_km(origin.latitude, origin.longitude, current_lat, current_lon);
    let to_destination = haversine_distance_km(
        current_lat,
        current_lon,
        destination.latitude,
        destination.longitude,
    );

    let is_at_origin = is_within_geofence(current_lat, current_lon, origin);
    let is_at_destination = is_within_geofence(current_lat, current_lon, destination);

    TripProgress {
        progress_percent: progress_percent(
            total,
            from_origin,
            to_destination,
            is_at_origin,
            is_at_destination,
        ),
        total_distance_km: total,
        distance_traveled_km: from_origin,
        distance_remaining_km: to_destination,
        is_at_origin,
        is_at_destination,
        nearest_location: None,
        nearest_distance_km: None,
    }
}

/// Progress of a position along origin → destination, annotated with the
/// nearest catalog location
pub fn compute_trip_progress(
    registry: &LocationRegistry,
    origin: &Location,
    destination: &Location,
    current_lat: f64,
    current_lon: f64,
) -> TripProgress {
    let mut progress = estimate_progress(origin, destination, current_lat, current_lon);

    if let Some(nearest) = registry.find_nearest(current_lat, current_lon) {
        progress.nearest_distance_km = Some(nearest.distance_km);
        progress.nearest_location = Some(nearest.location);
    }

    debug!(
        "Trip {} -> {}: {}% ({:.1} km remaining)",
        origin.id, destination.id, progress.progress_percent, progress.distance_remaining_km
    );

    progress
}

/// Same as [`compute_trip_progress`], resolving origin and destination by free-text name
pub fn compute_trip_progress_by_name(
    registry: &LocationRegistry,
    origin_name: &str,
    destination_name: &str,
    current_lat: f64,
    current_lon: f64,
) -> CoreResult<TripProgress> {
    let origin = registry
        .find_by_name(origin_name)
        .ok_or_else(|| CoreError::location_not_found(origin_name))?;
    let destination = registry
        .find_by_name(destination_name)
        .ok_or_else(|| CoreError::location_not_found(destination_name))?;

    Ok(compute_trip_progress(
        registry,
        &origin,
        &destination,
        current_lat,
        current_lon,
    ))
}

// ============================================================================
// TESTS
// ============================================================================
