//! Reference location: live GPS fix when available, fixed fallback otherwise.
//!
//! The current value lives in an `ArcSwap` so the GPS task can replace it
//! while the tracker reads it, without either side taking a lock.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Serialize;

use crate::geo::Coord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationSource {
    Gps,
    Fallback,
}

impl fmt::Display for LocationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationSource::Gps => write!(f, "Live GPS"),
            LocationSource::Fallback => write!(f, "Fallback"),
        }
    }
}

/// Snapshot of the reference point used for distance/bearing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
    pub source: LocationSource,
}

impl Location {
    pub fn coord(&self) -> Coord {
        Coord::new(self.lat, self.lon)
    }
}

/// Single-cell holder of the current reference location.
pub struct LocationProvider {
    fallback: Coord,
    current: ArcSwap<Location>,
}

impl LocationProvider {
    pub fn new(fallback: Coord) -> Self {
        LocationProvider {
            fallback,
            current: ArcSwap::from_pointee(Location {
                lat: fallback.lat,
                lon: fallback.lon,
                source: LocationSource::Fallback,
            }),
        }
    }

    /// Latest known location. Never blocks.
    pub fn current(&self) -> Location {
        **self.current.load()
    }

    /// Publish a new GPS fix. Out-of-range fixes are ignored.
    pub fn update_fix(&self, lat: f64, lon: f64) -> bool {
        let Some(fix) = Coord::checked(lat, lon) else {
            return false;
        };
        self.current.store(Arc::new(Location {
            lat: fix.lat,
            lon: fix.lon,
            source: LocationSource::Gps,
        }));
        true
    }

    pub fn fallback(&self) -> Coord {
        self.fallback
    }

    pub fn has_fix(&self) -> bool {
        self.current().source == LocationSource::Gps
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
