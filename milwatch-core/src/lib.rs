//! milwatch-core: feed parsing, rule matching, and alert tracking for
//! aircraft of interest.
//!
//! No async, no network. The `milwatch-server` crate wraps this with the
//! feed connection, GPS reader, sinks, and web viewer.

pub mod config;
pub mod geo;
pub mod location;
pub mod nmea;
pub mod record;
pub mod rules;
pub mod sbs;
pub mod tracker;
pub mod types;

// Re-export commonly used types at crate root
pub use geo::Coord;
pub use location::{Location, LocationProvider, LocationSource};
pub use record::AlertRecord;
pub use rules::{MatchCategory, MatchResult, RangeKind, RuleTable};
pub use sbs::AircraftObservation;
pub use tracker::{AlertTracker, SuppressionPolicy};
pub use types::*;
