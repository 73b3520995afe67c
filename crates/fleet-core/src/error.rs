//! Error types for the fleet tracking engine

use thiserror::Error;

/// Core error type for the fleet tracking engine
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Location not found: {0}")]
    LocationNotFound(String),

    #[error("Location already exists: {0}")]
    DuplicateLocation(String),

    #[error("Invalid position: latitude={lat}, longitude={lng}")]
    InvalidPosition { lat: f64, lng: f64 },

    #[error("Invalid geofence radius for {id}: {radius} m")]
    InvalidRadius { id: String, radius: f64 },

    #[error("Location name must not be blank: {0}")]
    BlankName(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub fn location_not_found(id: impl Into<String>) -> Self {
        Self::LocationNotFound(id.into())
    }

    pub fn invalid_position(lat: f64, lng: f64) -> Self {
        Self::InvalidPosition { lat, lng }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
