//! API request handlers

use crate::error::ApiError;
use crate::state::AppState;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use fleet_core::{
    Country, DEFAULT_GEOFENCE_RADIUS_M, Event, EventType, GeoPosition, Location, LocationId,
    LocationType, PositionSample, TripProgress, VehicleId,
};
use fleet_routing::{RouteResult, RouteSource};
use fleet_tracker::{
    EtaEstimate, TrackedVehicle, calculate_eta, compute_trip_progress, is_within_geofence,
    locations_containing,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

const DEFAULT_EVENT_LIMIT: usize = 100;

// ============================================================================
// REQUEST / RESPONSE TYPES
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
    pub locations: usize,
    pub vehicles: usize,
}

#[derive(Serialize)]
pub struct LocationListResponse {
    pub locations: Vec<Location>,
    pub total: usize,
}

#[derive(Deserialize)]
pub struct LocationFilter {
    pub country: Option<Country>,
    #[serde(rename = "type")]
    pub location_type: Option<LocationType>,
}

/// Location body for create and update; `id` comes from the path on update
#[derive(Deserialize)]
pub struct LocationBody {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "type", default)]
    pub location_type: LocationType,
    #[serde(default)]
    pub country: Country,
    #[serde(default)]
    pub radius: Option<f64>,
}

impl LocationBody {
    fn into_location(self, id: String) -> Location {
        Location::new(id, self.name, self.latitude, self.longitude)
            .with_type(self.location_type)
            .with_country(self.country)
            .with_radius(self.radius.unwrap_or(DEFAULT_GEOFENCE_RADIUS_M))
    }
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

#[derive(Deserialize)]
pub struct NearestQuery {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Deserialize)]
pub struct GeofenceCheckRequest {
    pub latitude: f64,
    pub longitude: f64,
    /// Check a single location instead of the whole catalog
    #[serde(default)]
    pub location_id: Option<String>,
}

#[derive(Serialize)]
pub struct GeofenceCheckResponse {
    pub inside: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<LocationId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_m: Option<f64>,
    /// Every active location whose geofence contains the point
    pub containing: Vec<LocationId>,
}

/// Origin and destination accept either a location id or free-text name
#[derive(Deserialize)]
pub struct TripProgressRequest {
    pub origin: String,
    pub destination: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub speed_kmh: Option<f64>,
}

#[derive(Serialize)]
pub struct TripProgressResponse {
    #[serde(flatten)]
    pub progress: TripProgress,
    pub eta: EtaEstimate,
}

#[derive(Deserialize)]
pub struct EtaQuery {
    pub distance_km: f64,
    pub speed_kmh: Option<f64>,
}

#[derive(Deserialize)]
pub struct RouteRequest {
    pub waypoints: Vec<GeoPosition>,
}

#[derive(Deserialize)]
pub struct TripAssignmentRequest {
    pub origin: String,
    pub destination: String,
}

#[derive(Serialize)]
pub struct VehicleListResponse {
    pub vehicles: Vec<TrackedVehicle>,
    pub total: usize,
}

#[derive(Deserialize)]
pub struct EventsQuery {
    pub limit: Option<usize>,
}

fn validate_position(latitude: f64, longitude: f64) -> Result<GeoPosition, ApiError> {
    let position = GeoPosition::new(latitude, longitude);
    if position.is_valid() {
        Ok(position)
    } else {
        Err(ApiError::bad_request(format!(
            "Invalid position: latitude={}, longitude={}",
            latitude, longitude
        )))
    }
}

/// Resolve a location by exact id first, then by name
fn resolve_location(state: &AppState, key: &str) -> Result<Location, ApiError> {
    let registry = state.registry();
    registry
        .get(&LocationId::new(key))
        .or_else(|| registry.find_by_name(key))
        .ok_or_else(|| ApiError::not_found(format!("Location not found: {}", key)))
}

// ============================================================================
// HEALTH & METRICS HANDLERS
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        timestamp: Utc::now().to_rfc3339(),
        locations: state.registry().len(),
        vehicles: state.tracker.vehicle_count(),
    })
}

/// Prometheus metrics endpoint
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    state.refresh_gauges();
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.export(),
    )
}

// ============================================================================
// LOCATION HANDLERS
// ============================================================================

/// List active locations, optionally filtered by country and type
pub async fn list_locations(
    State(state): State<AppState>,
    Query(filter): Query<LocationFilter>,
) -> impl IntoResponse {
    let registry = state.registry();
    let locations: Vec<Location> = match (filter.country, filter.location_type) {
        (Some(country), location_type) => registry
            .by_country(country)
            .into_iter()
            .filter(|l| location_type.is_none_or(|t| l.location_type == t))
            .collect(),
        (None, Some(location_type)) => registry.by_type(location_type),
        (None, None) => registry.list(),
    };

    let total = locations.len();
    Json(LocationListResponse { locations, total })
}

pub async fn get_location(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let location = state
        .registry()
        .get(&LocationId::new(&id))
        .ok_or_else(|| ApiError::not_found(format!("Location not found: {}", id)))?;

    Ok(Json(location))
}

pub async fn create_location(
    State(state): State<AppState>,
    Json(body): Json<LocationBody>,
) -> Result<impl IntoResponse, ApiError> {
    let id = body
        .id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Location id is required"))?;
    let location = body.into_location(id);

    state.registry().add(location.clone())?;
    info!("Location added: {} ({})", location.name, location.id);

    state
        .tracker
        .bus()
        .publish(Event::location_changed(EventType::LocationAdded, location.clone()));

    Ok((StatusCode::CREATED, Json(location)))
}

pub async fn update_location(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<LocationBody>,
) -> Result<impl IntoResponse, ApiError> {
    let location = body.into_location(id);
    state.registry().update(location.clone())?;
    info!("Location updated: {} ({})", location.name, location.id);

    state
        .tracker
        .bus()
        .publish(Event::location_changed(EventType::LocationUpdated, location.clone()));

    Ok(Json(location))
}

pub async fn delete_location(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = state.registry().remove(&LocationId::new(id))?;
    info!("Location removed: {} ({})", removed.name, removed.id);

    state
        .tracker
        .bus()
        .publish(Event::location_changed(EventType::LocationRemoved, removed.clone()));

    Ok(Json(removed))
}

/// Fuzzy name lookup
pub async fn search_locations(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let location = state
        .registry()
        .find_by_name(&query.q)
        .ok_or_else(|| ApiError::not_found(format!("No location matches '{}'", query.q)))?;

    Ok(Json(location))
}

pub async fn nearest_location(
    State(state): State<AppState>,
    Query(query): Query<NearestQuery>,
) -> Result<impl IntoResponse, ApiError> {
    validate_position(query.lat, query.lon)?;

    let nearest = state
        .registry()
        .find_nearest(query.lat, query.lon)
        .ok_or_else(|| ApiError::not_found("No location near the given position"))?;

    Ok(Json(nearest))
}

// ============================================================================
// CALCULATION HANDLERS
// ============================================================================

pub async fn check_geofence(
    State(state): State<AppState>,
    Json(req): Json<GeofenceCheckRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let position = validate_position(req.latitude, req.longitude)?;

    let containing: Vec<LocationId> =
        locations_containing(state.registry(), position.latitude, position.longitude)
            .into_iter()
            .map(|l| l.id)
            .collect();

    let response = match req.location_id {
        Some(id) => {
            let location = state
                .registry()
                .get(&LocationId::new(&id))
                .ok_or_else(|| ApiError::not_found(format!("Location not found: {}", id)))?;

            GeofenceCheckResponse {
                inside: is_within_geofence(position.latitude, position.longitude, &location),
                distance_m: Some(position.distance_to(&location.position()) * 1000.0),
                location_id: Some(location.id),
                containing,
            }
        }
        None => GeofenceCheckResponse {
            inside: !containing.is_empty(),
            location_id: None,
            distance_m: None,
            containing,
        },
    };

    Ok(Json(response))
}

pub async fn trip_progress(
    State(state): State<AppState>,
    Json(req): Json<TripProgressRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let position = validate_position(req.latitude, req.longitude)?;
    let origin = resolve_location(&state, &req.origin)?;
    let destination = resolve_location(&state, &req.destination)?;

    let progress = compute_trip_progress(
        state.registry(),
        &origin,
        &destination,
        position.latitude,
        position.longitude,
    );
    state.metrics.record_progress_computation();

    let eta = calculate_eta(progress.distance_remaining_km, req.speed_kmh);

    Ok(Json(TripProgressResponse { progress, eta }))
}

pub async fn eta(Query(query): Query<EtaQuery>) -> Result<impl IntoResponse, ApiError> {
    if !query.distance_km.is_finite() || query.distance_km < 0.0 {
        return Err(ApiError::bad_request("distance_km must be a non-negative number"));
    }

    Ok(Json(calculate_eta(query.distance_km, query.speed_kmh)))
}

/// Road route through the given waypoints, falling back to a straight-line estimate
pub async fn calculate_route(
    State(state): State<AppState>,
    Json(req): Json<RouteRequest>,
) -> Result<Json<RouteResult>, ApiError> {
    for waypoint in &req.waypoints {
        validate_position(waypoint.latitude, waypoint.longitude)?;
    }

    let start = Instant::now();
    let result = state.router.calculate_route(&req.waypoints).await;

    let source = match result.source {
        RouteSource::Road => "road",
        RouteSource::StraightLine => "straight_line",
    };
    state
        .metrics
        .record_route(source, start.elapsed().as_secs_f64());
    debug!(
        "Route over {} waypoints: {:.1} km via {}",
        req.waypoints.len(),
        result.distance_km,
        source
    );

    Ok(Json(result))
}

// ============================================================================
// VEHICLE HANDLERS
// ============================================================================

pub async fn list_vehicles(State(state): State<AppState>) -> impl IntoResponse {
    let vehicles = state.tracker.get_all_vehicles();
    let total = vehicles.len();
    Json(VehicleListResponse { vehicles, total })
}

/// Vehicles that have not reported within `STALE_AFTER_SECS`
pub async fn stale_vehicles(State(state): State<AppState>) -> impl IntoResponse {
    let vehicles = state.tracker.stale_vehicles();
    let total = vehicles.len();
    Json(VehicleListResponse { vehicles, total })
}

pub async fn get_vehicle(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let vehicle = state
        .tracker
        .get_vehicle(&VehicleId::new(&id))
        .ok_or_else(|| ApiError::not_found(format!("Vehicle not found: {}", id)))?;

    Ok(Json(vehicle))
}

/// Feed a position sample; returns any geofence transition plus trip progress
pub async fn update_vehicle_position(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(sample): Json<PositionSample>,
) -> Result<impl IntoResponse, ApiError> {
    let update = state
        .tracker
        .update_position(&VehicleId::new(id), sample)?;

    if let Some(event) = &update.geofence_event {
        state.metrics.record_geofence_event(event.event_type);
    }
    if update.progress.is_some() {
        state.metrics.record_progress_computation();
    }

    Ok(Json(update))
}

pub async fn assign_trip(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<TripAssignmentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let vehicle_id = VehicleId::new(id);
    let origin = resolve_location(&state, &req.origin)?;
    let destination = resolve_location(&state, &req.destination)?;

    state
        .tracker
        .assign_trip(&vehicle_id, origin.id, destination.id)?;

    let vehicle = state
        .tracker
        .get_vehicle(&vehicle_id)
        .ok_or_else(|| ApiError::Internal(format!("Vehicle {} vanished", vehicle_id)))?;

    Ok(Json(vehicle))
}

pub async fn clear_trip(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if state.tracker.clear_trip(&VehicleId::new(&id)) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("No trip assigned to {}", id)))
    }
}

// ============================================================================
// EVENT HANDLERS
// ============================================================================

/// Most recent events, oldest first
pub async fn recent_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(DEFAULT_EVENT_LIMIT);
    Json(state.tracker.bus().recent(limit))
}

// ============================================================================
// TESTS
// ============================================================================
