//! Great-circle distance and bearing on a spherical Earth.

use serde::Serialize;

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

impl Coord {
    pub fn new(lat: f64, lon: f64) -> Self {
        Coord { lat, lon }
    }

    /// Build a coordinate only if both components are finite and in range.
    pub fn checked(lat: f64, lon: f64) -> Option<Self> {
        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return None;
        }
        Some(Coord { lat, lon })
    }
}

/// Great-circle (haversine) distance in kilometres.
pub fn haversine_km(a: Coord, b: Coord) -> f64 {
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();
    let h = (dlat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    EARTH_RADIUS_KM * 2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Initial bearing from `from` towards `to`, degrees clockwise from true north in [0, 360).
pub fn initial_bearing_deg(from: Coord, to: Coord) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let dlon = (to.lon - from.lon).to_radians();
    let x = dlon.sin() * lat2.cos();
    let y = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    // atan2 yields (-180, 180], so one shift is enough
    (x.atan2(y).to_degrees() + 360.0) % 360.0
}

/// Distance (km) and bearing (deg) from a reference point to an aircraft.
pub fn distance_and_bearing(reference: Coord, aircraft: Coord) -> (f64, f64) {
    (
        haversine_km(reference, aircraft),
        initial_bearing_deg(reference, aircraft),
    )
}

// ---------------------------------------------------------------------------
// Compass
// ---------------------------------------------------------------------------

const COMPASS_POINTS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

const COMPASS_NAMES: [&str; 16] = [
    "North",
    "North-North-East",
    "North-East",
    "East-North-East",
    "East",
    "East-South-East",
    "South-East",
    "South-South-East",
    "South",
    "South-South-West",
    "South-West",
    "West-South-West",
    "West",
    "West-North-West",
    "North-West",
    "North-North-West",
];

fn compass_index(bearing_deg: f64) -> usize {
    let sector = 360.0 / COMPASS_POINTS.len() as f64;
    ((bearing_deg.rem_euclid(360.0) / sector).round() as usize) % COMPASS_POINTS.len()
}

/// 16-point abbreviation ("NNE") for a bearing.
pub fn compass_point(bearing_deg: f64) -> &'static str {
    COMPASS_POINTS[compass_index(bearing_deg)]
}

/// 16-point spoken name ("North-North-East") for a bearing.
pub fn compass_name(bearing_deg: f64) -> &'static str {
    COMPASS_NAMES[compass_index(bearing_deg)]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
