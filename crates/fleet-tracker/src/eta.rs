//! Arrival time estimation from remaining distance and speed

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Speed assumed when the vehicle is stopped, crawling or reports no speed
pub const DEFAULT_SPEED_KMH: f64 = 60.0;

/// Reported speeds at or below this are treated as stationary
pub const MIN_MOVING_SPEED_KMH: f64 = 10.0;

/// Estimated time of arrival
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EtaEstimate {
    pub eta: DateTime<Utc>,
    pub duration_minutes: i64,
    pub hours: i64,
    pub minutes: i64,
    pub effective_speed_kmh: f64,
    pub used_default_speed: bool,
    /// "Xh Ym", or "Ym" under an hour
    pub formatted_duration: String,
    /// Wall-clock arrival as HH:MM (UTC)
    pub formatted_arrival: String,
}

/// Format a minute count as "Xh Ym" or "Ym"
pub fn format_duration(total_minutes: i64) -> String {
    let total_minutes = total_minutes.max(0);
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

/// ETA relative to an explicit `now`
pub fn calculate_eta_at(now: DateTime<Utc>, distance_km: f64, speed_kmh: Option<f64>) -> EtaEstimate {
    let distance_km = if distance_km.is_finite() {
        distance_km.max(0.0)
    } else {
        0.0
    };

    let (effective_speed_kmh, used_default_speed) = match speed_kmh {
        Some(speed) if speed.is_finite() && speed > MIN_MOVING_SPEED_KMH => (speed, false),
        _ => (DEFAULT_SPEED_KMH, true),
    };

    let duration_minutes = (distance_km / effective_speed_kmh * 60.0).round() as i64;
    let eta = Duration::try_minutes(duration_minutes)
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);

    EtaEstimate {
        eta,
        duration_minutes,
        hours: duration_minutes / 60,
        minutes: duration_minutes % 60,
        effective_speed_kmh,
        used_default_speed,
        formatted_duration: format_duration(duration_minutes),
        formatted_arrival: eta.format("%H:%M").to_string(),
    }
}

/// ETA from the current wall clock
pub fn calculate_eta(distance_km: f64, speed_kmh: Option<f64>) -> EtaEstimate {
    calculate_eta_at(Utc::now(), distance_km, speed_kmh)
}

// ============================================================================
// TESTS
// ============================================================================
