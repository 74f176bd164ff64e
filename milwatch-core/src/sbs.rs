//! SBS-1 (BaseStation, port 30003) line parser.
//!
//! Each line is one comma-separated record. Only `MSG` records carry aircraft
//! data; the fields used for matching are:
//!
//! | idx | field             |
//! |-----|-------------------|
//! | 0   | record type `MSG` |
//! | 1   | transmission 1-8  |
//! | 4   | hex identifier    |
//! | 10  | callsign          |
//! | 11  | altitude (ft)     |
//! | 12  | ground speed (kt) |
//! | 14  | latitude          |
//! | 15  | longitude         |
//!
//! Everything else is ignored. Short lines are fine as long as the
//! identifier is present; optional fields past the end are absent.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::geo::Coord;
use crate::types::{normalize_icao, ParseError};

const FIELD_TYPE: usize = 0;
const FIELD_TRANSMISSION: usize = 1;
const FIELD_ICAO: usize = 4;
const FIELD_CALLSIGN: usize = 10;
const FIELD_ALTITUDE: usize = 11;
const FIELD_SPEED: usize = 12;
const FIELD_LAT: usize = 14;
const FIELD_LON: usize = 15;

/// Fields up to and including the identifier.
const MIN_FIELDS: usize = FIELD_ICAO + 1;

/// One aircraft sighting, produced per accepted feed line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AircraftObservation {
    /// Uppercase hex address, always non-empty.
    pub identifier: String,
    /// SBS transmission type (1 = identification, 3 = airborne position, ...).
    pub transmission: u8,
    pub callsign: Option<String>,
    pub altitude_ft: Option<i32>,
    pub speed_kts: Option<f64>,
    pub position: Option<Coord>,
    pub timestamp: DateTime<Utc>,
}

impl AircraftObservation {
    /// Bare observation with only an identifier. Used by tests and self-test.
    pub fn new(identifier: &str, timestamp: DateTime<Utc>) -> Self {
        AircraftObservation {
            identifier: identifier.trim().to_ascii_uppercase(),
            transmission: 0,
            callsign: None,
            altitude_ft: None,
            speed_kts: None,
            position: None,
            timestamp,
        }
    }

    pub fn with_callsign(mut self, callsign: &str) -> Self {
        self.callsign = clean_callsign(callsign);
        self
    }

    pub fn with_position(mut self, lat: f64, lon: f64) -> Self {
        self.position = Coord::checked(lat, lon);
        self
    }

    pub fn with_altitude(mut self, altitude_ft: i32) -> Self {
        self.altitude_ft = Some(altitude_ft);
        self
    }

    pub fn with_speed(mut self, speed_kts: f64) -> Self {
        self.speed_kts = Some(speed_kts);
        self
    }
}

/// Parse a feed line stamped with the current time.
pub fn parse(line: &str) -> Result<AircraftObservation, ParseError> {
    parse_at(line, Utc::now())
}

/// Parse a feed line with an explicit capture time.
pub fn parse_at(line: &str, timestamp: DateTime<Utc>) -> Result<AircraftObservation, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ParseError::Empty);
    }

    let parts: Vec<&str> = line.split(',').collect();
    if parts.len() < MIN_FIELDS {
        return Err(ParseError::TooFewFields {
            expected: MIN_FIELDS,
            actual: parts.len(),
        });
    }

    let kind = parts[FIELD_TYPE].trim();
    if kind != "MSG" {
        return Err(ParseError::Unsupported(kind.to_string()));
    }

    let raw_type = parts[FIELD_TRANSMISSION].trim();
    let transmission = match raw_type.parse::<u8>() {
        Ok(t @ 1..=8) => t,
        _ => return Err(ParseError::InvalidTransmissionType(raw_type.to_string())),
    };

    let raw_icao = parts[FIELD_ICAO].trim();
    if raw_icao.is_empty() {
        return Err(ParseError::MissingIdentifier);
    }
    let identifier =
        normalize_icao(raw_icao).ok_or_else(|| ParseError::InvalidIdentifier(raw_icao.into()))?;

    let field = |idx: usize| parts.get(idx).map(|s| s.trim()).filter(|s| !s.is_empty());

    let position = match (
        field(FIELD_LAT).and_then(|v| v.parse::<f64>().ok()),
        field(FIELD_LON).and_then(|v| v.parse::<f64>().ok()),
    ) {
        (Some(lat), Some(lon)) => Coord::checked(lat, lon),
        _ => None,
    };

    Ok(AircraftObservation {
        identifier,
        transmission,
        callsign: field(FIELD_CALLSIGN).and_then(clean_callsign),
        altitude_ft: field(FIELD_ALTITUDE).and_then(|v| v.parse().ok()),
        speed_kts: field(FIELD_SPEED).and_then(|v| v.parse().ok()),
        position,
        timestamp,
    })
}

/// Trim a callsign; blank becomes absent.
fn clean_callsign(raw: &str) -> Option<String> {
    let cs = raw.trim();
    if cs.is_empty() {
        None
    } else {
        Some(cs.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
