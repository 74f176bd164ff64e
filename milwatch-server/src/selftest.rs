//! One-shot self-test: canned sightings through the full tracker and
//! dispatcher, with a per-sink health report.

use chrono::Utc;
use comfy_table::{Cell, Table};
use milwatch_core::rules::RangeKind;
use milwatch_core::types::icao_from_u32;
use milwatch_core::{
    AircraftObservation, AlertRecord, AlertTracker, Location, MatchCategory, RuleTable,
};

use crate::dispatch::{DispatchReport, Dispatcher};

/// Offset (degrees) of the canned aircraft from the reference location.
const TEST_OFFSET_DEG: f64 = 0.1;

/// Health of one sink across all test alerts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkHealth {
    pub sink: String,
    pub attempts: usize,
    pub failures: usize,
    pub last_error: Option<String>,
}

#[derive(Debug)]
pub struct SelfTestReport {
    pub location: Location,
    pub alerts: Vec<AlertRecord>,
    pub sinks: Vec<SinkHealth>,
}

impl SelfTestReport {
    pub fn passed(&self) -> bool {
        !self.alerts.is_empty() && self.sinks.iter().all(|s| s.failures == 0)
    }

    pub fn render(&self) -> String {
        let mut out = format!(
            "Location: {:.4}, {:.4} ({})\n",
            self.location.lat, self.location.lon, self.location.source
        );
        for alert in &self.alerts {
            out.push_str(&format!(
                "Alert: {} [{}] {}\n",
                alert.display_name(),
                alert.category,
                alert.label
            ));
        }

        let mut table = Table::new();
        table.set_header(vec!["Sink", "Attempts", "Failures", "Last error"]);
        for sink in &self.sinks {
            table.add_row(vec![
                Cell::new(&sink.sink),
                Cell::new(sink.attempts),
                Cell::new(sink.failures),
                Cell::new(sink.last_error.as_deref().unwrap_or("-")),
            ]);
        }
        out.push_str(&table.to_string());
        out
    }
}

/// One observation per populated rule category, positioned just north-east
/// of `reference`.
pub fn canned_observations(rules: &RuleTable, reference: &Location) -> Vec<AircraftObservation> {
    let now = Utc::now();
    let lat = reference.lat + TEST_OFFSET_DEG;
    let lon = reference.lon + TEST_OFFSET_DEG;
    let mut out = Vec::new();

    for (kind, category) in [
        (RangeKind::Military, MatchCategory::MilitaryRange),
        (RangeKind::LocalInterest, MatchCategory::LocalInterest),
    ] {
        if rules.ranges(kind).next().is_none() {
            continue;
        }
        match identifier_matching(rules, kind, category) {
            Some(icao) => out.push(
                AircraftObservation::new(&icao_from_u32(icao), now)
                    .with_position(lat, lon)
                    .with_altitude(10000)
                    .with_speed(250.0),
            ),
            None => tracing::warn!(%category, "Every identifier is shadowed by an earlier rule; skipping"),
        }
    }

    if let Some(prefix) = rules.prefixes().next() {
        match rules.first_unmatched_identifier() {
            Some(free) => out.push(
                AircraftObservation::new(&icao_from_u32(free), now)
                    .with_callsign(&format!("{}101", prefix.prefix))
                    .with_position(lat, lon)
                    .with_altitude(10000)
                    .with_speed(250.0),
            ),
            None => tracing::warn!("No identifier outside all ranges; skipping callsign test"),
        }
    }
    out
}

/// First identifier in a `kind` range that the table actually reports as
/// `category`. Skips over spans claimed by military ranges, which match first.
fn identifier_matching(rules: &RuleTable, kind: RangeKind, category: MatchCategory) -> Option<u32> {
    for range in rules.ranges(kind) {
        let mut candidate = range.low;
        while candidate <= range.high {
            let found = rules
                .match_identity(&icao_from_u32(candidate), None)
                .map(|m| m.category);
            if found == Some(category) {
                return Some(candidate);
            }
            let shadow_end = rules
                .ranges(RangeKind::Military)
                .filter(|r| r.contains(candidate))
                .map(|r| r.high)
                .max()?;
            candidate = shadow_end.checked_add(1)?;
        }
    }
    None
}

/// Stand-in alert used when the rule table is empty.
pub fn test_trigger(reference: &Location) -> AlertRecord {
    let position = milwatch_core::Coord::new(
        reference.lat + TEST_OFFSET_DEG,
        reference.lon + TEST_OFFSET_DEG,
    );
    let (distance_km, bearing_deg) =
        milwatch_core::geo::distance_and_bearing(reference.coord(), position);
    AlertRecord {
        timestamp: Utc::now(),
        identifier: "AE0101".into(),
        callsign: Some("TEST101".into()),
        label: "Test Trigger".into(),
        category: MatchCategory::MilitaryRange,
        altitude_ft: Some(10000),
        speed_kts: Some(250.0),
        position: Some(position),
        reference: *reference,
        distance_km: Some(distance_km),
        bearing_deg: Some(bearing_deg),
    }
}

/// Run the canned sightings and collect per-sink health.
pub async fn run(tracker: &mut AlertTracker, dispatcher: &Dispatcher) -> SelfTestReport {
    let location = tracker.location().current();
    let observations = canned_observations(tracker.rules(), &location);

    let mut alerts = Vec::new();
    for obs in &observations {
        match tracker.evaluate(obs) {
            Some(record) => alerts.push(record),
            None => tracing::warn!(identifier = %obs.identifier, "Canned sighting raised no alert"),
        }
    }
    if alerts.is_empty() {
        tracing::info!("Rule table empty; dispatching test trigger");
        alerts.push(test_trigger(&location));
    }

    let mut reports = Vec::new();
    for alert in &alerts {
        reports.push(dispatcher.dispatch(alert).await);
    }

    SelfTestReport {
        location,
        sinks: summarize(dispatcher.sink_names(), &reports),
        alerts,
    }
}

fn summarize(names: Vec<&str>, reports: &[DispatchReport]) -> Vec<SinkHealth> {
    let mut health: Vec<SinkHealth> = names
        .into_iter()
        .map(|name| SinkHealth {
            sink: name.to_string(),
            attempts: 0,
            failures: 0,
            last_error: None,
        })
        .collect();

    for report in reports {
        for (slot, outcome) in health.iter_mut().zip(&report.outcomes) {
            slot.attempts += 1;
            if let Err(e) = &outcome.result {
                slot.failures += 1;
                slot.last_error = Some(e.to_string());
            }
        }
    }
    health
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use milwatch_core::{Coord, LocationProvider, SuppressionPolicy};

    use crate::dispatch::tests::CountingSink;

    fn tracker(rules: RuleTable) -> AlertTracker {
        AlertTracker::new(
            rules,
            Arc::new(LocationProvider::new(Coord::new(38.95, -77.38))),
            SuppressionPolicy::default(),
        )
    }

    fn full_rules() -> RuleTable {
        let mut rules = RuleTable::new();
        rules.add_range(RangeKind::Military, "US Air Force", 0xAE0100, 0xAE0847);
        rules.add_range(RangeKind::LocalInterest, "State Police", 0xA12345, 0xA12345);
        rules.add_prefix("RCH");
        rules
    }

    #[test]
    fn test_canned_observations_cover_every_category() {
        let rules = full_rules();
        let reference = LocationProvider::new(Coord::new(38.95, -77.38)).current();
        let observations = canned_observations(&rules, &reference);

        let categories: Vec<MatchCategory> = observations
            .iter()
            .filter_map(|o| rules.matches(o))
            .map(|m| m.category)
            .collect();
        assert_eq!(
            categories,
            vec![
                MatchCategory::MilitaryRange,
                MatchCategory::LocalInterest,
                MatchCategory::Callsign
            ]
        );
        let pos = observations[0].position.unwrap();
        assert!((pos.lat - 39.05).abs() < 1e-9);
    }

    #[test]
    fn test_local_interest_inside_military_block() {
        let mut rules = RuleTable::new();
        rules.add_range(RangeKind::Military, "US Military", 0xADF7C8, 0xAFFFFF);
        rules.add_range(RangeKind::LocalInterest, "Army Medevac", 0xAE1234, 0xAE1234);
        rules.add_range(RangeKind::LocalInterest, "County Sheriff", 0xADF7C8, 0xB00010);
        rules.add_prefix("RCH");
        let reference = LocationProvider::new(Coord::new(38.95, -77.38)).current();
        let observations = canned_observations(&rules, &reference);

        let categories: Vec<MatchCategory> = observations
            .iter()
            .filter_map(|o| rules.matches(o))
            .map(|m| m.category)
            .collect();
        assert_eq!(
            categories,
            vec![
                MatchCategory::MilitaryRange,
                MatchCategory::LocalInterest,
                MatchCategory::Callsign
            ]
        );
        assert_eq!(observations[1].identifier, "B00000");
    }

    #[test]
    fn test_fully_shadowed_category_skipped() {
        let mut rules = RuleTable::new();
        rules.add_range(RangeKind::Military, "US Military", 0xADF7C8, 0xAFFFFF);
        rules.add_range(RangeKind::LocalInterest, "Army Medevac", 0xAE1234, 0xAE1234);
        let reference = LocationProvider::new(Coord::new(38.95, -77.38)).current();
        let observations = canned_observations(&rules, &reference);

        assert_eq!(observations.len(), 1);
        assert_eq!(
            rules.matches(&observations[0]).map(|m| m.category),
            Some(MatchCategory::MilitaryRange)
        );
    }

    #[tokio::test]
    async fn test_every_sink_exercised() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut failing = CountingSink::new("flaky", &calls);
        failing.fail = true;
        let dispatcher = Dispatcher::new(Duration::from_secs(5))
            .with_sink(CountingSink::new("ok", &calls))
            .with_sink(failing);

        let mut tracker = tracker(full_rules());
        let report = run(&mut tracker, &dispatcher).await;

        assert_eq!(report.alerts.len(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 6);
        assert_eq!(report.sinks[0].attempts, 3);
        assert_eq!(report.sinks[0].failures, 0);
        assert_eq!(report.sinks[1].failures, 3);
        assert_eq!(report.sinks[1].last_error.as_deref(), Some("HTTP status 500"));
        assert!(!report.passed());

        let text = report.render();
        assert!(text.contains("Location: 38.9500, -77.3800 (Fallback)"));
        assert!(text.contains("flaky"));
    }

    #[tokio::test]
    async fn test_empty_rules_use_test_trigger() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher =
            Dispatcher::new(Duration::from_secs(5)).with_sink(CountingSink::new("ok", &calls));

        let mut tracker = tracker(RuleTable::new());
        let report = run(&mut tracker, &dispatcher).await;

        assert_eq!(report.alerts.len(), 1);
        assert_eq!(report.alerts[0].label, "Test Trigger");
        assert!(report.alerts[0].distance_km.is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(report.passed());
    }
}
