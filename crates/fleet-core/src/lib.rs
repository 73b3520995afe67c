//! # Fleet Core
//!
//! Core domain models and types for the fleet tracking engine.
//! This crate provides the location catalog records, position samples,
//! progress results and geo primitives shared by every other crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod error;
pub mod events;
pub mod geo;

pub use error::{CoreError, CoreResult};
pub use events::*;
pub use geo::*;

/// Geofence radius applied when a catalog entry does not specify one
pub const DEFAULT_GEOFENCE_RADIUS_M: f64 = 500.0;

// ============================================================================
// VEHICLE MODELS
// ============================================================================

/// Unique identifier for a tracked vehicle
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VehicleId(pub String);

impl VehicleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VehicleId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VehicleId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A single fix from the telematics feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Ground speed in km/h, when the feed reports one
    #[serde(default)]
    pub speed_kmh: Option<f64>,
    /// Heading in degrees (0-360)
    #[serde(default)]
    pub heading_degrees: Option<f64>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl PositionSample {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            speed_kmh: None,
            heading_degrees: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_speed(mut self, speed_kmh: f64) -> Self {
        self.speed_kmh = Some(speed_kmh);
        self
    }

    pub fn with_heading(mut self, heading_degrees: f64) -> Self {
        self.heading_degrees = Some(heading_degrees);
        self
    }

    pub fn position(&self) -> GeoPosition {
        GeoPosition::new(self.latitude, self.longitude)
    }
}

// ============================================================================
// LOCATION MODELS
// ============================================================================

/// Unique identifier for a catalog location
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocationId(pub String);

impl LocationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of named point of interest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationType {
    Depot,
    Warehouse,
    Market,
    Border,
    Farm,
    Customer,
}

impl Default for LocationType {
    fn default() -> Self {
        Self::Depot
    }
}

impl fmt::Display for LocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LocationType::Depot => "depot",
            LocationType::Warehouse => "warehouse",
            LocationType::Market => "market",
            LocationType::Border => "border",
            LocationType::Farm => "farm",
            LocationType::Customer => "customer",
        };
        f.write_str(name)
    }
}

/// Countries the fleet operates in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Country {
    Zimbabwe,
    SouthAfrica,
    Mozambique,
    Zambia,
    Botswana,
    Malawi,
}

impl Default for Country {
    fn default() -> Self {
        Self::Zimbabwe
    }
}

fn default_radius() -> f64 {
    DEFAULT_GEOFENCE_RADIUS_M
}

fn default_active() -> bool {
    true
}

/// A depot, waypoint or other named location with a circular geofence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "type", default)]
    pub location_type: LocationType,
    #[serde(default)]
    pub country: Country,
    /// Geofence radius in meters
    #[serde(default = "default_radius")]
    pub radius: f64,
    /// Soft-delete flag; inactive locations are skipped by every lookup
    #[serde(default = "default_active")]
    pub active: bool,
}

impl Location {
    pub fn new(id: impl Into<String>, name: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self {
            id: LocationId::new(id),
            name: name.into(),
            latitude: lat,
            longitude: lng,
            location_type: LocationType::default(),
            country: Country::default(),
            radius: DEFAULT_GEOFENCE_RADIUS_M,
            active: true,
        }
    }

    pub fn with_type(mut self, location_type: LocationType) -> Self {
        self.location_type = location_type;
        self
    }

    pub fn with_country(mut self, country: Country) -> Self {
        self.country = country;
        self
    }

    pub fn with_radius(mut self, radius_m: f64) -> Self {
        self.radius = radius_m;
        self
    }

    pub fn position(&self) -> GeoPosition {
        GeoPosition::new(self.latitude, self.longitude)
    }

    /// Geofence radius in kilometers
    pub fn radius_km(&self) -> f64 {
        self.radius / 1000.0
    }

    /// Check for a non-blank name, coordinate ranges and a positive finite radius
    pub fn validate(&self) -> CoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::BlankName(self.id.0.clone()));
        }
        if !self.position().is_valid() {
            return Err(CoreError::invalid_position(self.latitude, self.longitude));
        }
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(CoreError::InvalidRadius {
                id: self.id.0.clone(),
                radius: self.radius,
            });
        }
        Ok(())
    }
}

/// Catalog entry closest to a point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearestLocation {
    pub location: Location,
    pub distance_km: f64,
}

// ============================================================================
// TRIP MODELS
// ============================================================================

/// Progress of a vehicle along an origin/destination trip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripProgress {
    /// Percent complete, always within 0..=100
    pub progress_percent: u8,
    pub total_distance_km: f64,
    pub distance_traveled_km: f64,
    pub distance_remaining_km: f64,
    pub is_at_origin: bool,
    pub is_at_destination: bool,
    pub nearest_location: Option<Location>,
    pub nearest_distance_km: Option<f64>,
}

// ============================================================================
// TESTS
// ============================================================================
