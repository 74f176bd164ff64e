//! Shared error enums and identifier helpers for milwatch-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced outside the feed and rule paths (config, file I/O).
#[derive(Debug, Error)]
pub enum MilwatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(String),
    #[error(transparent)]
    RuleLoad(#[from] RuleLoadError),
}

pub type Result<T> = std::result::Result<T, MilwatchError>;

/// Why a feed line was rejected. Never fatal: the driver logs and skips.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("blank line")]
    Empty,
    #[error("expected at least {expected} fields, got {actual}")]
    TooFewFields { expected: usize, actual: usize },
    #[error("unsupported record type {0:?}")]
    Unsupported(String),
    #[error("invalid transmission type {0:?}")]
    InvalidTransmissionType(String),
    #[error("missing aircraft identifier")]
    MissingIdentifier,
    #[error("invalid aircraft identifier {0:?}")]
    InvalidIdentifier(String),
}

/// Malformed rule source. Raised at startup only.
#[derive(Debug, Error)]
pub enum RuleLoadError {
    #[error("cannot read rule file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{source_name}:{line}: {reason}")]
    Malformed {
        source_name: String,
        line: usize,
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// ICAO identifier helpers
// ---------------------------------------------------------------------------

/// Largest 24-bit ICAO address.
pub const ICAO_MAX: u32 = 0xFF_FFFF;

/// Parse a 1-6 digit hex identifier into its 24-bit integer form.
pub fn icao_to_u32(hex: &str) -> Option<u32> {
    let hex = hex.trim();
    if hex.is_empty() || hex.len() > 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(hex, 16).ok()
}

/// Format a 24-bit address as a 6-char uppercase hex string.
pub fn icao_from_u32(val: u32) -> String {
    format!("{:06X}", val & ICAO_MAX)
}

/// Normalize an identifier to uppercase hex. Returns `None` if it is not hex.
pub fn normalize_icao(hex: &str) -> Option<String> {
    let hex = hex.trim();
    icao_to_u32(hex)?;
    Some(hex.to_ascii_uppercase())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icao_to_u32() {
        assert_eq!(icao_to_u32("AE0100"), Some(0xAE0100));
        assert_eq!(icao_to_u32("ae0100"), Some(0xAE0100));
        assert_eq!(icao_to_u32("1"), Some(1));
        assert_eq!(icao_to_u32("AE01000"), None); // 7 digits
        assert_eq!(icao_to_u32("ZZ0100"), None);
        assert_eq!(icao_to_u32(""), None);
        assert_eq!(icao_to_u32("+1"), None);
    }

    #[test]
    fn test_icao_from_u32() {
        assert_eq!(icao_from_u32(0xAE0100), "AE0100");
        assert_eq!(icao_from_u32(0x1), "000001");
    }

    #[test]
    fn test_normalize_icao() {
        assert_eq!(normalize_icao(" ae01ff ").as_deref(), Some("AE01FF"));
        assert!(normalize_icao("~A1B2C3").is_none());
    }

    #[test]
    fn test_rule_load_error_display() {
        let err = RuleLoadError::Malformed {
            source_name: "icao_ranges.csv".into(),
            line: 3,
            reason: "bad hex".into(),
        };
        assert_eq!(err.to_string(), "icao_ranges.csv:3: bad hex");
    }
}
