//! Per-aircraft alert state. The single gate deciding whether a sighting
//! becomes an alert.
//!
//! Pure logic, no I/O. The caller feeds observations in arrival order and
//! hands any returned `AlertRecord` to the dispatcher.
//!
//! Two maps are kept per identifier:
//! - merged aircraft state (callsign, position, altitude, speed), since SBS
//!   spreads these over separate transmission types. Pruned when stale.
//! - last-alert time. Never pruned; entries expire logically through the
//!   suppression policy.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::geo::{distance_and_bearing, Coord};
use crate::location::LocationProvider;
use crate::record::AlertRecord;
use crate::rules::RuleTable;
use crate::sbs::AircraftObservation;

/// Merged aircraft state is dropped after this many seconds of silence.
pub const STALE_TIMEOUT_SECS: i64 = 300;

/// Default re-alert window (10 minutes).
pub const DEFAULT_SUPPRESSION_SECS: i64 = 600;

// ---------------------------------------------------------------------------
// Suppression policy
// ---------------------------------------------------------------------------

/// When may the same aircraft alert again?
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressionPolicy {
    /// At most one alert per identifier for the life of the process.
    OncePerRun,
    /// Re-alert once strictly more than this much time has passed.
    Window(Duration),
}

impl SuppressionPolicy {
    pub fn window_secs(secs: i64) -> Self {
        SuppressionPolicy::Window(Duration::seconds(secs))
    }

    /// Is an alert at `now` suppressed by one at `last`?
    pub fn suppresses(&self, last: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self {
            SuppressionPolicy::OncePerRun => true,
            SuppressionPolicy::Window(window) => now - last <= *window,
        }
    }
}

impl Default for SuppressionPolicy {
    fn default() -> Self {
        SuppressionPolicy::window_secs(DEFAULT_SUPPRESSION_SECS)
    }
}

// ---------------------------------------------------------------------------
// Aircraft state
// ---------------------------------------------------------------------------

/// Latest known fields for one aircraft, merged across feed lines.
#[derive(Debug, Clone)]
pub struct AircraftState {
    pub callsign: Option<String>,
    pub position: Option<Coord>,
    pub altitude_ft: Option<i32>,
    pub speed_kts: Option<f64>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub message_count: u64,
}

impl AircraftState {
    fn new(timestamp: DateTime<Utc>) -> Self {
        AircraftState {
            callsign: None,
            position: None,
            altitude_ft: None,
            speed_kts: None,
            first_seen: timestamp,
            last_seen: timestamp,
            message_count: 0,
        }
    }

    fn merge(&mut self, obs: &AircraftObservation) {
        if obs.callsign.is_some() {
            self.callsign.clone_from(&obs.callsign);
        }
        if obs.position.is_some() {
            self.position = obs.position;
        }
        if obs.altitude_ft.is_some() {
            self.altitude_ft = obs.altitude_ft;
        }
        if obs.speed_kts.is_some() {
            self.speed_kts = obs.speed_kts;
        }
        if obs.timestamp > self.last_seen {
            self.last_seen = obs.timestamp;
        }
        self.message_count += 1;
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now - self.last_seen > Duration::seconds(STALE_TIMEOUT_SECS)
    }
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/// Owns the rule table, the suppression policy and all per-aircraft memory.
pub struct AlertTracker {
    rules: RuleTable,
    location: Arc<LocationProvider>,
    policy: SuppressionPolicy,
    require_position: bool,
    aircraft: HashMap<String, AircraftState>,
    last_alert: HashMap<String, DateTime<Utc>>,

    // Counters
    pub observations: u64,
    pub matches: u64,
    pub suppressed: u64,
    pub deferred: u64,
    pub alerts: u64,
}

impl AlertTracker {
    pub fn new(
        rules: RuleTable,
        location: Arc<LocationProvider>,
        policy: SuppressionPolicy,
    ) -> Self {
        AlertTracker {
            rules,
            location,
            policy,
            require_position: false,
            aircraft: HashMap::new(),
            last_alert: HashMap::new(),
            observations: 0,
            matches: 0,
            suppressed: 0,
            deferred: 0,
            alerts: 0,
        }
    }

    /// Hold alerts back until the aircraft has reported a position.
    pub fn with_require_position(mut self, require: bool) -> Self {
        self.require_position = require;
        self
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn policy(&self) -> SuppressionPolicy {
        self.policy
    }

    pub fn location(&self) -> &Arc<LocationProvider> {
        &self.location
    }

    /// Timestamp of the last alert raised for an identifier.
    pub fn last_alert(&self, identifier: &str) -> Option<DateTime<Utc>> {
        self.last_alert.get(identifier).copied()
    }

    pub fn aircraft(&self, identifier: &str) -> Option<&AircraftState> {
        self.aircraft.get(identifier)
    }

    pub fn tracked_count(&self) -> usize {
        self.aircraft.len()
    }

    /// Evaluate one observation. The observation timestamp is "now".
    ///
    /// Returns a record only when a rule matches, the aircraft is outside
    /// its suppression window, and (if configured) a position is known.
    pub fn evaluate(&mut self, obs: &AircraftObservation) -> Option<AlertRecord> {
        self.observations += 1;
        let now = obs.timestamp;

        let state = self
            .aircraft
            .entry(obs.identifier.clone())
            .or_insert_with(|| AircraftState::new(now));
        if state.is_stale(now) {
            *state = AircraftState::new(now);
        }
        state.merge(obs);

        let matched = self
            .rules
            .match_identity(&obs.identifier, state.callsign.as_deref())?;
        self.matches += 1;

        if let Some(&last) = self.last_alert.get(&obs.identifier) {
            if self.policy.suppresses(last, now) {
                self.suppressed += 1;
                return None;
            }
        }

        if self.require_position && state.position.is_none() {
            self.deferred += 1;
            return None;
        }

        let reference = self.location.current();
        let (distance_km, bearing_deg) = match state.position {
            Some(pos) => {
                let (d, b) = distance_and_bearing(reference.coord(), pos);
                (Some(d), Some(b))
            }
            None => (None, None),
        };

        let record = AlertRecord {
            timestamp: now,
            identifier: obs.identifier.clone(),
            callsign: state.callsign.clone(),
            label: matched.label,
            category: matched.category,
            altitude_ft: state.altitude_ft,
            speed_kts: state.speed_kts,
            position: state.position,
            reference,
            distance_km,
            bearing_deg,
        };

        self.last_alert.insert(obs.identifier.clone(), now);
        self.alerts += 1;
        Some(record)
    }

    /// Drop merged state for aircraft silent past the stale timeout.
    /// Alert memory is kept. Returns count removed.
    pub fn prune_stale(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.aircraft.len();
        self.aircraft.retain(|_, ac| !ac.is_stale(now));
        before - self.aircraft.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::LocationSource;
    use crate::rules::{MatchCategory, RangeKind};
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn rules() -> RuleTable {
        let mut r = RuleTable::new();
        r.add_range(RangeKind::Military, "US Air Force", 0xAE0100, 0xAE0847);
        r.add_range(RangeKind::LocalInterest, "Medevac", 0xA00001, 0xA00001);
        r.add_prefix("RCH");
        r
    }

    fn home() -> Arc<LocationProvider> {
        Arc::new(LocationProvider::new(Coord::new(38.95, -77.38)))
    }

    fn make_tracker(policy: SuppressionPolicy) -> AlertTracker {
        AlertTracker::new(rules(), home(), policy)
    }

    #[test]
    fn test_range_match_alerts() {
        let mut tracker = make_tracker(SuppressionPolicy::default());
        let obs = AircraftObservation::new("AE0200", t(0));
        let rec = tracker.evaluate(&obs).expect("alert");
        assert_eq!(rec.label, "US Air Force");
        assert_eq!(rec.category, MatchCategory::MilitaryRange);
        assert_eq!(rec.timestamp, t(0));
        assert_eq!(tracker.alerts, 1);
    }

    #[test]
    fn test_no_match_returns_none() {
        let mut tracker = make_tracker(SuppressionPolicy::default());
        let obs = AircraftObservation::new("4840D6", t(0)).with_callsign("KLM1023");
        assert!(tracker.evaluate(&obs).is_none());
        assert!(tracker.last_alert("4840D6").is_none());
        assert_eq!(tracker.matches, 0);
    }

    #[test]
    fn test_duplicate_suppressed_memory_keeps_first() {
        let mut tracker = make_tracker(SuppressionPolicy::default());
        assert!(tracker.evaluate(&AircraftObservation::new("AE0200", t(0))).is_some());
        assert!(tracker.evaluate(&AircraftObservation::new("AE0200", t(1))).is_none());
        assert_eq!(tracker.last_alert("AE0200"), Some(t(0)));
        assert_eq!(tracker.suppressed, 1);
    }

    #[test]
    fn test_realert_after_window() {
        let mut tracker = make_tracker(SuppressionPolicy::window_secs(600));
        assert!(tracker.evaluate(&AircraftObservation::new("AE0200", t(0))).is_some());
        // exactly at the window edge: still suppressed
        assert!(tracker.evaluate(&AircraftObservation::new("AE0200", t(600))).is_none());
        let again = tracker.evaluate(&AircraftObservation::new("AE0200", t(601)));
        assert!(again.is_some());
        assert_eq!(tracker.last_alert("AE0200"), Some(t(601)));
    }

    #[test]
    fn test_once_per_run_never_realerts() {
        let mut tracker = make_tracker(SuppressionPolicy::OncePerRun);
        assert!(tracker.evaluate(&AircraftObservation::new("AE0200", t(0))).is_some());
        assert!(tracker
            .evaluate(&AircraftObservation::new("AE0200", t(86_400)))
            .is_none());
    }

    #[test]
    fn test_suppression_is_per_identifier() {
        let mut tracker = make_tracker(SuppressionPolicy::default());
        assert!(tracker.evaluate(&AircraftObservation::new("AE0200", t(0))).is_some());
        assert!(tracker.evaluate(&AircraftObservation::new("AE0201", t(1))).is_some());
    }

    #[test]
    fn test_callsign_prefix_alert_without_position() {
        let mut tracker = make_tracker(SuppressionPolicy::default());
        let ident = AircraftObservation::new("4840D6", t(0)).with_callsign("KLM1023");
        assert!(tracker.evaluate(&ident).is_none());

        let ident = AircraftObservation::new("3C6DD2", t(1)).with_callsign("RCH456");
        let first = tracker.evaluate(&ident).expect("callsign alert");
        assert_eq!(first.category, MatchCategory::Callsign);
        assert_eq!(first.label, "RCH");
        assert!(first.distance_km.is_none());
    }

    #[test]
    fn test_require_position_defers_without_touching_memory() {
        let mut tracker =
            make_tracker(SuppressionPolicy::default()).with_require_position(true);
        let ident = AircraftObservation::new("3C6DD2", t(0)).with_callsign("RCH456");
        assert!(tracker.evaluate(&ident).is_none());
        assert_eq!(tracker.deferred, 1);
        assert!(tracker.last_alert("3C6DD2").is_none());

        // position line has no callsign, merged state supplies it
        let pos = AircraftObservation::new("3C6DD2", t(2)).with_position(39.05, -77.28);
        let rec = tracker.evaluate(&pos).expect("alert once position known");
        assert_eq!(rec.callsign.as_deref(), Some("RCH456"));
        assert!(rec.distance_km.is_some());
    }

    #[test]
    fn test_distance_and_bearing_filled() {
        let mut tracker = make_tracker(SuppressionPolicy::default());
        let obs = AircraftObservation::new("AE0200", t(0))
            .with_position(39.05, -77.28)
            .with_altitude(10000);
        let rec = tracker.evaluate(&obs).unwrap();
        let d = rec.distance_km.unwrap();
        let b = rec.bearing_deg.unwrap();
        assert!(d > 13.0 && d < 15.0, "got {d}");
        assert!(b > 30.0 && b < 45.0, "got {b}");
        assert_eq!(rec.reference.source, LocationSource::Fallback);
        assert_eq!(rec.altitude_ft, Some(10000));
    }

    #[test]
    fn test_distance_zero_at_reference() {
        let mut tracker = make_tracker(SuppressionPolicy::default());
        let obs = AircraftObservation::new("AE0200", t(0)).with_position(38.95, -77.38);
        let rec = tracker.evaluate(&obs).unwrap();
        assert!(rec.distance_km.unwrap().abs() < 1e-9);
    }

    #[test]
    fn test_uses_live_gps_reference() {
        let location = home();
        let mut tracker = AlertTracker::new(rules(), Arc::clone(&location), SuppressionPolicy::default());
        location.update_fix(39.05, -77.28);
        let obs = AircraftObservation::new("AE0200", t(0)).with_position(39.05, -77.28);
        let rec = tracker.evaluate(&obs).unwrap();
        assert_eq!(rec.reference.source, LocationSource::Gps);
        assert!(rec.distance_km.unwrap() < 1e-6);
    }

    #[test]
    fn test_prune_keeps_alert_memory() {
        let mut tracker = make_tracker(SuppressionPolicy::OncePerRun);
        tracker.evaluate(&AircraftObservation::new("AE0200", t(0)));
        assert_eq!(tracker.tracked_count(), 1);
        assert_eq!(tracker.prune_stale(t(10)), 0);
        assert_eq!(tracker.prune_stale(t(STALE_TIMEOUT_SECS + 1)), 1);
        assert_eq!(tracker.tracked_count(), 0);
        assert_eq!(tracker.last_alert("AE0200"), Some(t(0)));
        assert!(tracker
            .evaluate(&AircraftObservation::new("AE0200", t(1000)))
            .is_none());
    }

    #[test]
    fn test_message_count_and_merge() {
        let mut tracker = make_tracker(SuppressionPolicy::default());
        tracker.evaluate(&AircraftObservation::new("4840D6", t(0)).with_altitude(38000));
        tracker.evaluate(&AircraftObservation::new("4840D6", t(1)).with_speed(450.0));
        let ac = tracker.aircraft("4840D6").unwrap();
        assert_eq!(ac.message_count, 2);
        assert_eq!(ac.altitude_ft, Some(38000));
        assert_eq!(ac.speed_kts, Some(450.0));
        assert_eq!(ac.last_seen, t(1));
        assert_eq!(ac.first_seen, t(0));
    }

    #[test]
    fn test_stale_state_not_merged_into_new_sighting() {
        let mut tracker = make_tracker(SuppressionPolicy::Window(Duration::seconds(60)));
        let first = AircraftObservation::new("AE0200", t(10))
            .with_position(39.05, -77.28)
            .with_callsign("RCH456");
        assert!(tracker.evaluate(&first).is_some());

        // silent past the stale timeout without a prune in between
        let back = AircraftObservation::new("AE0200", t(590)).with_altitude(12000);
        let rec = tracker.evaluate(&back).expect("re-alert after window");
        assert!(rec.position.is_none());
        assert!(rec.distance_km.is_none());
        assert!(rec.callsign.is_none());
        assert_eq!(rec.altitude_ft, Some(12000));

        let ac = tracker.aircraft("AE0200").unwrap();
        assert_eq!(ac.message_count, 1);
        assert_eq!(ac.first_seen, t(590));
    }
}
