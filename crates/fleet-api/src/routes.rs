//! API route definitions

use crate::handlers;
use crate::state::AppState;

use axum::{
    Router,
    extract::{MatchedPath, Request, State},
    http::HeaderValue,
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
};
use std::time::{Duration, Instant};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = if state.config.cors_permissive {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
            .max_age(Duration::from_secs(3600))
    } else {
        let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
        match state.config.cors_origin.parse::<HeaderValue>() {
            Ok(origin) => cors.allow_origin(origin),
            Err(_) => {
                warn!("Ignoring invalid CORS_ORIGIN {:?}", state.config.cors_origin);
                cors
            }
        }
    };

    Router::new()
        // Health & Metrics
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        // Location catalog
        .route(
            "/api/v1/locations",
            get(handlers::list_locations).post(handlers::create_location),
        )
        .route("/api/v1/locations/search", get(handlers::search_locations))
        .route("/api/v1/locations/nearest", get(handlers::nearest_location))
        .route(
            "/api/v1/locations/{id}",
            get(handlers::get_location)
                .put(handlers::update_location)
                .delete(handlers::delete_location),
        )
        // Calculations
        .route("/api/v1/geofence/check", post(handlers::check_geofence))
        .route("/api/v1/trips/progress", post(handlers::trip_progress))
        .route("/api/v1/eta", get(handlers::eta))
        .route("/api/v1/routes", post(handlers::calculate_route))
        // Vehicle tracking
        .route("/api/v1/vehicles", get(handlers::list_vehicles))
        .route("/api/v1/vehicles/stale", get(handlers::stale_vehicles))
        .route("/api/v1/vehicles/{id}", get(handlers::get_vehicle))
        .route(
            "/api/v1/vehicles/{id}/position",
            post(handlers::update_vehicle_position),
        )
        .route(
            "/api/v1/vehicles/{id}/trip",
            put(handlers::assign_trip).delete(handlers::clear_trip),
        )
        .route("/api/v1/events/recent", get(handlers::recent_events))
        .route_layer(middleware::from_fn_with_state(state.clone(), track_requests))
        // Apply middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .with_state(state)
}

/// Count and time every routed request, labelled by route template
async fn track_requests(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned());

    let response = next.run(req).await;

    state.metrics.record_api_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}
