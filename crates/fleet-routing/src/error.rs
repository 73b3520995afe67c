//! Routing error types

use thiserror::Error;

/// Reasons a road route could not be obtained.
///
/// These never escape [`crate::RoadRouter::calculate_route`]; they are
/// rendered into `RouteResult::error` alongside the straight-line estimate.
#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("At least 2 waypoints are required, got {0}")]
    InsufficientWaypoints(usize),

    #[error("Routing request failed: {0}")]
    Http(String),

    #[error("Routing service returned HTTP {0}")]
    Status(u16),

    #[error("No route found: {0}")]
    NoRoute(String),

    #[error("Malformed routing response: {0}")]
    Decode(String),

    #[error("Routing service timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl From<reqwest::Error> for RoutingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RoutingError::Decode(err.to_string())
        } else {
            RoutingError::Http(err.to_string())
        }
    }
}

pub type RoutingResult<T> = Result<T, RoutingError>;
