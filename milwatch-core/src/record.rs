//! Alert record handed to every sink.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::geo::{compass_name, compass_point, Coord};
use crate::location::Location;
use crate::rules::MatchCategory;

const KM_PER_MILE: f64 = 1.609_344;

/// An alert, created once when a match first fires. Immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertRecord {
    pub timestamp: DateTime<Utc>,
    pub identifier: String,
    pub callsign: Option<String>,
    pub label: String,
    pub category: MatchCategory,
    pub altitude_ft: Option<i32>,
    pub speed_kts: Option<f64>,
    pub position: Option<Coord>,
    pub reference: Location,
    pub distance_km: Option<f64>,
    pub bearing_deg: Option<f64>,
}

impl AlertRecord {
    /// Callsign if known, identifier otherwise.
    pub fn display_name(&self) -> &str {
        self.callsign.as_deref().unwrap_or(&self.identifier)
    }

    pub fn distance_mi(&self) -> Option<f64> {
        self.distance_km.map(|km| km / KM_PER_MILE)
    }

    /// "NNE" style compass point for the bearing.
    pub fn compass_point(&self) -> Option<&'static str> {
        self.bearing_deg.map(compass_point)
    }

    pub fn compass_name(&self) -> Option<&'static str> {
        self.bearing_deg.map(compass_name)
    }

    /// "12.3 km" or "unknown distance".
    pub fn distance_text(&self) -> String {
        match self.distance_km {
            Some(km) => format!("{km:.1} km"),
            None => "unknown distance".to_string(),
        }
    }

    /// "45° NE" or "unknown bearing".
    pub fn bearing_text(&self) -> String {
        match (self.bearing_deg, self.compass_point()) {
            (Some(deg), Some(point)) => format!("{}° {point}", deg.round() as i64 % 360),
            _ => "unknown bearing".to_string(),
        }
    }

    pub fn altitude_text(&self) -> String {
        self.altitude_ft
            .map(|a| format!("{a} ft"))
            .unwrap_or_else(|| "? ft".into())
    }

    pub fn speed_text(&self) -> String {
        self.speed_kts
            .map(|s| format!("{s:.0} kts"))
            .unwrap_or_else(|| "? kts".into())
    }

    /// Live-tracking link on globe.adsbexchange.com.
    pub fn map_link(&self) -> String {
        match self.position {
            Some(p) => format!(
                "https://globe.adsbexchange.com/?lat={:.4}&lon={:.4}&zoom=8&icao={}",
                p.lat, p.lon, self.identifier
            ),
            None => format!("https://globe.adsbexchange.com/?icao={}", self.identifier),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
