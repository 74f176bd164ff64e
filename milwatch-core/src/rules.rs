//! Rule table: identifier ranges and callsign prefixes.
//!
//! Evaluation order is fixed: military ranges, then local-interest ranges,
//! then callsign prefixes. A numeric match always wins over a textual one.
//! Within a category the first registered rule wins.

use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::sbs::AircraftObservation;
use crate::types::{icao_to_u32, RuleLoadError};

/// Which kind of rule produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchCategory {
    MilitaryRange,
    LocalInterest,
    Callsign,
}

impl MatchCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchCategory::MilitaryRange => "military-range",
            MatchCategory::LocalInterest => "local-interest",
            MatchCategory::Callsign => "callsign",
        }
    }
}

impl fmt::Display for MatchCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source table a range rule came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    Military,
    LocalInterest,
}

impl RangeKind {
    fn category(self) -> MatchCategory {
        match self {
            RangeKind::Military => MatchCategory::MilitaryRange,
            RangeKind::LocalInterest => MatchCategory::LocalInterest,
        }
    }
}

/// Inclusive identifier interval `[low, high]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeRule {
    pub label: String,
    pub low: u32,
    pub high: u32,
    pub kind: RangeKind,
}

impl RangeRule {
    pub fn contains(&self, icao: u32) -> bool {
        (self.low..=self.high).contains(&icao)
    }
}

/// Case-insensitive callsign prefix. Stored uppercase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixRule {
    pub label: String,
    pub prefix: String,
}

impl PrefixRule {
    pub fn matches(&self, callsign: &str) -> bool {
        callsign.trim().to_ascii_uppercase().starts_with(&self.prefix)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    Range(RangeRule),
    Prefix(PrefixRule),
}

/// The rule that fired for an aircraft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    pub label: String,
    pub category: MatchCategory,
}

/// Ordered rule set, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    pub fn new() -> Self {
        RuleTable { rules: Vec::new() }
    }

    /// Load the two range tables and the prefix list.
    pub fn from_files(
        military: &Path,
        local_interest: &Path,
        callsigns: &Path,
    ) -> Result<Self, RuleLoadError> {
        let mut table = RuleTable::new();
        table.extend(load_range_file(military, RangeKind::Military)?);
        table.extend(load_range_file(local_interest, RangeKind::LocalInterest)?);
        table.extend(load_prefix_file(callsigns)?);
        Ok(table)
    }

    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn extend(&mut self, rules: impl IntoIterator<Item = Rule>) {
        self.rules.extend(rules);
    }

    /// Register a range rule. Bounds must already be valid (`low <= high`).
    pub fn add_range(&mut self, kind: RangeKind, label: &str, low: u32, high: u32) {
        self.push(Rule::Range(RangeRule {
            label: label.to_string(),
            low,
            high,
            kind,
        }));
    }

    /// Register a prefix rule labelled with the prefix itself.
    pub fn add_prefix(&mut self, prefix: &str) {
        let prefix = prefix.trim().to_ascii_uppercase();
        self.push(Rule::Prefix(PrefixRule {
            label: prefix.clone(),
            prefix,
        }));
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn count(&self, category: MatchCategory) -> usize {
        self.rules
            .iter()
            .filter(|r| rule_category(r) == category)
            .count()
    }

    /// Match a single observation by its own identifier and callsign.
    pub fn matches(&self, observation: &AircraftObservation) -> Option<MatchResult> {
        self.match_identity(&observation.identifier, observation.callsign.as_deref())
    }

    /// Match an identifier and (optional) callsign.
    pub fn match_identity(&self, identifier: &str, callsign: Option<&str>) -> Option<MatchResult> {
        if let Some(icao) = icao_to_u32(identifier) {
            for kind in [RangeKind::Military, RangeKind::LocalInterest] {
                if let Some(r) = self.ranges(kind).find(|r| r.contains(icao)) {
                    return Some(MatchResult {
                        label: r.label.clone(),
                        category: kind.category(),
                    });
                }
            }
        }

        let callsign = callsign.map(str::trim).filter(|c| !c.is_empty())?;
        self.prefixes()
            .find(|p| p.matches(callsign))
            .map(|p| MatchResult {
                label: p.label.clone(),
                category: MatchCategory::Callsign,
            })
    }

    pub fn ranges(&self, kind: RangeKind) -> impl Iterator<Item = &RangeRule> {
        self.rules.iter().filter_map(move |r| match r {
            Rule::Range(range) if range.kind == kind => Some(range),
            _ => None,
        })
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &PrefixRule> {
        self.rules.iter().filter_map(|r| match r {
            Rule::Prefix(p) => Some(p),
            _ => None,
        })
    }

    /// Lowest identifier that no range rule covers.
    pub fn first_unmatched_identifier(&self) -> Option<u32> {
        let mut bounds: Vec<(u32, u32)> = self
            .rules
            .iter()
            .filter_map(|r| match r {
                Rule::Range(range) => Some((range.low, range.high)),
                _ => None,
            })
            .collect();
        bounds.sort_unstable();

        let mut candidate = 1u32; // 000000 is not a real address
        for (low, high) in bounds {
            if candidate < low {
                break;
            }
            candidate = candidate.max(high.saturating_add(1));
        }
        (candidate <= crate::types::ICAO_MAX).then_some(candidate)
    }
}

fn rule_category(rule: &Rule) -> MatchCategory {
    match rule {
        Rule::Range(r) => r.kind.category(),
        Rule::Prefix(_) => MatchCategory::Callsign,
    }
}

// ---------------------------------------------------------------------------
// Loaders
// ---------------------------------------------------------------------------

fn read_source(path: &Path) -> Result<String, RuleLoadError> {
    std::fs::read_to_string(path).map_err(|source| RuleLoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Load a `label,lowHex,highHex` range file.
pub fn load_range_file(path: &Path, kind: RangeKind) -> Result<Vec<Rule>, RuleLoadError> {
    let text = read_source(path)?;
    parse_range_table(&text, kind, &source_name(path))
}

/// Load a one-prefix-per-line callsign file.
pub fn load_prefix_file(path: &Path) -> Result<Vec<Rule>, RuleLoadError> {
    Ok(parse_prefix_list(&read_source(path)?))
}

/// Parse range-table text. Blank lines and `#` comments are skipped.
pub fn parse_range_table(
    text: &str,
    kind: RangeKind,
    source_name: &str,
) -> Result<Vec<Rule>, RuleLoadError> {
    let mut rules = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let malformed = |reason: String| RuleLoadError::Malformed {
            source_name: source_name.to_string(),
            line: idx + 1,
            reason,
        };

        let parts: Vec<&str> = line.split(',').map(str::trim).collect();
        let [label, low, high] = parts.as_slice() else {
            return Err(malformed(format!(
                "expected label,lowHex,highHex, got {} fields",
                parts.len()
            )));
        };

        if label.is_empty() {
            return Err(malformed("empty label".into()));
        }
        let low_val = icao_to_u32(low).ok_or_else(|| malformed(format!("bad hex bound {low:?}")))?;
        let high_val =
            icao_to_u32(high).ok_or_else(|| malformed(format!("bad hex bound {high:?}")))?;
        if low_val > high_val {
            return Err(malformed(format!("inverted range {low}-{high}")));
        }

        rules.push(Rule::Range(RangeRule {
            label: label.to_string(),
            low: low_val,
            high: high_val,
            kind,
        }));
    }

    Ok(rules)
}

/// Parse a prefix list. Prefixes are uppercased.
pub fn parse_prefix_list(text: &str) -> Vec<Rule> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|l| {
            let prefix = l.to_ascii_uppercase();
            Rule::Prefix(PrefixRule {
                label: prefix.clone(),
                prefix,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
