//! Event types for the fleet tracking engine
//!
//! Geofence transitions are the engine's primary output; the envelope types
//! carry them (and progress/catalog changes) to subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Location, LocationId, PositionSample, TripProgress, VehicleId};

/// Direction of a geofence transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeofenceEventType {
    Entry,
    Exit,
}

/// A vehicle crossed a location's geofence between two consecutive samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceEvent {
    pub location_id: LocationId,
    pub location_name: String,
    pub event_type: GeofenceEventType,
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
}

impl GeofenceEvent {
    pub fn entry(location: &Location, latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self::build(location, GeofenceEventType::Entry, latitude, longitude, timestamp)
    }

    pub fn exit(location: &Location, latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self::build(location, GeofenceEventType::Exit, latitude, longitude, timestamp)
    }

    fn build(
        location: &Location,
        event_type: GeofenceEventType,
        latitude: f64,
        longitude: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            location_id: location.id.clone(),
            location_name: location.name.clone(),
            event_type,
            timestamp,
            latitude,
            longitude,
        }
    }
}

/// Event envelope for everything published on the event bus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(event_type: EventType, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event_type,
            payload,
        }
    }

    pub fn vehicle_position_updated(vehicle_id: VehicleId, sample: PositionSample) -> Self {
        Self::new(
            EventType::VehiclePositionUpdated,
            EventPayload::VehiclePosition(VehiclePositionEvent { vehicle_id, sample }),
        )
    }

    pub fn geofence(vehicle_id: VehicleId, event: GeofenceEvent) -> Self {
        let event_type = match event.event_type {
            GeofenceEventType::Entry => EventType::GeofenceEntered,
            GeofenceEventType::Exit => EventType::GeofenceExited,
        };
        Self::new(
            event_type,
            EventPayload::Geofence(VehicleGeofenceEvent { vehicle_id, event }),
        )
    }

    pub fn trip_progress(vehicle_id: VehicleId, progress: TripProgress) -> Self {
        Self::new(
            EventType::TripProgressUpdated,
            EventPayload::TripProgress(TripProgressEvent { vehicle_id, progress }),
        )
    }

    pub fn location_changed(event_type: EventType, location: Location) -> Self {
        Self::new(event_type, EventPayload::Location(LocationEvent { location }))
    }

    /// Geofence transition carried by this envelope, if any
    pub fn as_geofence(&self) -> Option<&GeofenceEvent> {
        match &self.payload {
            EventPayload::Geofence(e) => Some(&e.event),
            _ => None,
        }
    }
}

/// Type of event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    // Vehicle events
    VehiclePositionUpdated,
    TripProgressUpdated,

    // Geofence events
    GeofenceEntered,
    GeofenceExited,

    // Catalog events
    LocationAdded,
    LocationUpdated,
    LocationRemoved,
}

/// Event payload variants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EventPayload {
    VehiclePosition(VehiclePositionEvent),
    Geofence(VehicleGeofenceEvent),
    TripProgress(TripProgressEvent),
    Location(LocationEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehiclePositionEvent {
    pub vehicle_id: VehicleId,
    pub sample: PositionSample,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleGeofenceEvent {
    pub vehicle_id: VehicleId,
    pub event: GeofenceEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripProgressEvent {
    pub vehicle_id: VehicleId,
    pub progress: TripProgress,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationEvent {
    pub location: Location,
}

// ============================================================================
// TESTS
// ============================================================================
