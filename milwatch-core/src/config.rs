//! Configuration file management for milwatch.
//!
//! Reads/writes `~/.milwatch/config.yaml`: feed address, fallback home
//! location, rule files, suppression policy, and per-sink settings.

use std::path::{Path, PathBuf};

use crate::geo::Coord;
use crate::tracker::{SuppressionPolicy, DEFAULT_SUPPRESSION_SECS};
use crate::types::MilwatchError;

/// Full configuration structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub feed: FeedConfig,
    pub home: HomeConfig,
    pub rules: RulesConfig,
    pub alerts: AlertsConfig,
    pub log: LogConfig,
    pub web: WebConfig,
    pub speech: SpeechConfig,
    pub push: PushConfig,
    pub gps: GpsConfig,
    pub dispatch: DispatchConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    pub host: String,
    pub port: u16,
    pub reconnect_secs: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HomeConfig {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RulesConfig {
    pub military: String,
    pub local_interest: String,
    pub callsigns: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertsConfig {
    /// Seconds between alerts for the same aircraft; `None` means once per run.
    pub suppression_secs: Option<i64>,
    pub require_position: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WebConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub capacity: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeechConfig {
    pub enabled: bool,
    pub program: String,
    pub args: Vec<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PushConfig {
    pub enabled: bool,
    pub url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GpsConfig {
    pub device: Option<String>,
    pub interval_secs: u64,
    pub fix_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchConfig {
    pub sink_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            feed: FeedConfig {
                host: "127.0.0.1".into(),
                port: 30003,
                reconnect_secs: 10,
            },
            home: HomeConfig {
                lat: 38.95,
                lon: -77.38,
            },
            rules: RulesConfig {
                military: "~/.milwatch/icao_ranges.csv".into(),
                local_interest: "~/.milwatch/local_interest.csv".into(),
                callsigns: "~/.milwatch/military_callsigns.txt".into(),
            },
            alerts: AlertsConfig {
                suppression_secs: Some(DEFAULT_SUPPRESSION_SECS),
                require_position: false,
            },
            log: LogConfig {
                path: "~/.milwatch/alert_log.csv".into(),
            },
            web: WebConfig {
                enabled: true,
                host: "0.0.0.0".into(),
                port: 5001,
                capacity: 25,
            },
            speech: SpeechConfig {
                enabled: true,
                program: "espeak-ng".into(),
                args: vec!["-a".into(), "200".into(), "-s".into(), "150".into()],
                timeout_secs: 20,
            },
            push: PushConfig {
                enabled: true,
                url: "https://ntfy.sh/ADSB-ALERTS".into(),
                timeout_secs: 10,
            },
            gps: GpsConfig {
                device: None,
                interval_secs: 600,
                fix_timeout_secs: 60,
            },
            dispatch: DispatchConfig {
                sink_timeout_secs: 30,
            },
        }
    }
}

impl Config {
    pub fn home_coord(&self) -> Coord {
        Coord::new(self.home.lat, self.home.lon)
    }

    pub fn suppression_policy(&self) -> SuppressionPolicy {
        match self.alerts.suppression_secs {
            Some(secs) => SuppressionPolicy::window_secs(secs),
            None => SuppressionPolicy::OncePerRun,
        }
    }
}

/// Get the config directory path (`~/.milwatch/`).
pub fn config_dir() -> PathBuf {
    dirs_home().join(".milwatch")
}

/// Get the default config file path.
pub fn config_file() -> PathBuf {
    config_dir().join("config.yaml")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Expand a leading `~/` to the home directory.
pub fn expand_path(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs_home().join(rest),
        None if path == "~" => dirs_home(),
        None => PathBuf::from(path),
    }
}

/// Load config from `path`, or the default location when `None`.
///
/// Returns default config if the file doesn't exist or can't be read.
/// Text that reads but doesn't parse is an error.
pub fn load_config(path: Option<&Path>) -> Result<Config, MilwatchError> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_file);
    if !path.exists() {
        return Ok(Config::default());
    }
    let text = match std::fs::read_to_string(&path) {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Config unreadable; using defaults");
            return Ok(Config::default());
        }
    };
    parse_config(&text)
}

/// Save config, creating parent directories. Returns the written path.
pub fn save_config(config: &Config, path: Option<&Path>) -> Result<PathBuf, MilwatchError> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_file);
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| MilwatchError::Config(e.to_string()))?;
    }
    std::fs::write(&path, serialize_config(config))
        .map_err(|e| MilwatchError::Config(e.to_string()))?;
    Ok(path)
}

/// Parse simple YAML-like config text.
pub fn parse_config(text: &str) -> Result<Config, MilwatchError> {
    let mut config = Config::default();
    let mut current_section: Option<String> = None;

    for (idx, line) in text.lines().enumerate() {
        let stripped = strip_comment(line).trim();
        if stripped.is_empty() {
            continue;
        }

        let is_indented = line.starts_with("  ") || line.starts_with('\t');
        let Some((key, val)) = stripped.split_once(':') else {
            return Err(bad_line(idx, "expected `key: value`"));
        };
        let key = key.trim();
        let val = val.trim();

        if !is_indented {
            if !val.is_empty() {
                return Err(bad_line(idx, "top-level keys must be sections"));
            }
            current_section = Some(key.to_string());
            continue;
        }

        let Some(section) = current_section.as_deref() else {
            return Err(bad_line(idx, "value outside of a section"));
        };
        apply_value(&mut config, section, key, val).map_err(|msg| bad_line(idx, &msg))?;
    }

    Ok(config)
}

fn bad_line(idx: usize, msg: &str) -> MilwatchError {
    MilwatchError::Config(format!("line {}: {msg}", idx + 1))
}

/// Drop a trailing `# comment` that is not inside quotes.
fn strip_comment(line: &str) -> &str {
    let mut in_quotes = None;
    for (i, c) in line.char_indices() {
        match (c, in_quotes) {
            ('"' | '\'', None) => in_quotes = Some(c),
            (q, Some(open)) if q == open => in_quotes = None,
            ('#', None) => return &line[..i],
            _ => {}
        }
    }
    line
}

fn apply_value(config: &mut Config, section: &str, key: &str, val: &str) -> Result<(), String> {
    match (section, key) {
        ("feed", "host") => config.feed.host = req_string(val)?,
        ("feed", "port") => config.feed.port = parse_num(val)?,
        ("feed", "reconnect_secs") => config.feed.reconnect_secs = parse_num(val)?,
        ("home", "lat") => config.home.lat = parse_num(val)?,
        ("home", "lon") => config.home.lon = parse_num(val)?,
        ("rules", "military") => config.rules.military = req_string(val)?,
        ("rules", "local_interest") => config.rules.local_interest = req_string(val)?,
        ("rules", "callsigns") => config.rules.callsigns = req_string(val)?,
        ("alerts", "suppression") => {
            config.alerts.suppression_secs = match parse_string_value(val).as_deref() {
                Some("once") => None,
                _ => match parse_num::<i64>(val)? {
                    secs if secs < 0 => return Err(format!("suppression must be >= 0, got {secs}")),
                    secs => Some(secs),
                },
            }
        }
        ("alerts", "require_position") => config.alerts.require_position = parse_bool(val)?,
        ("log", "path") => config.log.path = req_string(val)?,
        ("web", "enabled") => config.web.enabled = parse_bool(val)?,
        ("web", "host") => config.web.host = req_string(val)?,
        ("web", "port") => config.web.port = parse_num(val)?,
        ("web", "capacity") => config.web.capacity = parse_num(val)?,
        ("speech", "enabled") => config.speech.enabled = parse_bool(val)?,
        ("speech", "program") => config.speech.program = req_string(val)?,
        ("speech", "args") => {
            config.speech.args = parse_string_value(val)
                .map(|s| s.split_whitespace().map(String::from).collect())
                .unwrap_or_default()
        }
        ("speech", "timeout_secs") => config.speech.timeout_secs = parse_num(val)?,
        ("push", "enabled") => config.push.enabled = parse_bool(val)?,
        ("push", "url") => config.push.url = req_string(val)?,
        ("push", "timeout_secs") => config.push.timeout_secs = parse_num(val)?,
        ("gps", "device") => config.gps.device = parse_string_value(val),
        ("gps", "interval_secs") => config.gps.interval_secs = parse_num(val)?,
        ("gps", "fix_timeout_secs") => config.gps.fix_timeout_secs = parse_num(val)?,
        ("dispatch", "sink_timeout_secs") => {
            config.dispatch.sink_timeout_secs = match parse_num::<u64>(val)? {
                0 => return Err("sink_timeout_secs must be at least 1".to_string()),
                secs => secs,
            }
        }
        _ => return Err(format!("unknown key {section}.{key}")),
    }
    Ok(())
}

fn parse_string_value(val: &str) -> Option<String> {
    if val == "null" || val == "~" || val.is_empty() {
        return None;
    }
    // Strip quotes
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return Some(val[1..val.len() - 1].to_string());
    }
    Some(val.to_string())
}

fn req_string(val: &str) -> Result<String, String> {
    parse_string_value(val).ok_or_else(|| "value required".to_string())
}

fn parse_num<T: std::str::FromStr>(val: &str) -> Result<T, String> {
    val.parse().map_err(|_| format!("invalid number {val:?}"))
}

fn parse_bool(val: &str) -> Result<bool, String> {
    match val {
        "true" | "yes" | "on" => Ok(true),
        "false" | "no" | "off" => Ok(false),
        _ => Err(format!("invalid boolean {val:?}")),
    }
}

/// Serialize config to YAML-like text.
pub fn serialize_config(config: &Config) -> String {
    let mut lines = vec!["# milwatch configuration".to_string(), String::new()];

    lines.push("feed:".into());
    lines.push(format!("  host: \"{}\"", config.feed.host));
    lines.push(format!("  port: {}", config.feed.port));
    lines.push(format!("  reconnect_secs: {}", config.feed.reconnect_secs));
    lines.push(String::new());

    lines.push("home:".into());
    lines.push(format!("  lat: {}", config.home.lat));
    lines.push(format!("  lon: {}", config.home.lon));
    lines.push(String::new());

    lines.push("rules:".into());
    lines.push(format!("  military: \"{}\"", config.rules.military));
    lines.push(format!("  local_interest: \"{}\"", config.rules.local_interest));
    lines.push(format!("  callsigns: \"{}\"", config.rules.callsigns));
    lines.push(String::new());

    lines.push("alerts:".into());
    match config.alerts.suppression_secs {
        Some(secs) => lines.push(format!("  suppression: {secs}")),
        None => lines.push("  suppression: once".into()),
    }
    lines.push(format!("  require_position: {}", config.alerts.require_position));
    lines.push(String::new());

    lines.push("log:".into());
    lines.push(format!("  path: \"{}\"", config.log.path));
    lines.push(String::new());

    lines.push("web:".into());
    lines.push(format!("  enabled: {}", config.web.enabled));
    lines.push(format!("  host: \"{}\"", config.web.host));
    lines.push(format!("  port: {}", config.web.port));
    lines.push(format!("  capacity: {}", config.web.capacity));
    lines.push(String::new());

    lines.push("speech:".into());
    lines.push(format!("  enabled: {}", config.speech.enabled));
    lines.push(format!("  program: \"{}\"", config.speech.program));
    lines.push(format!("  args: \"{}\"", config.speech.args.join(" ")));
    lines.push(format!("  timeout_secs: {}", config.speech.timeout_secs));
    lines.push(String::new());

    lines.push("push:".into());
    lines.push(format!("  enabled: {}", config.push.enabled));
    lines.push(format!("  url: \"{}\"", config.push.url));
    lines.push(format!("  timeout_secs: {}", config.push.timeout_secs));
    lines.push(String::new());

    lines.push("gps:".into());
    match &config.gps.device {
        Some(dev) => lines.push(format!("  device: \"{dev}\"")),
        None => lines.push("  device: null".into()),
    }
    lines.push(format!("  interval_secs: {}", config.gps.interval_secs));
    lines.push(format!("  fix_timeout_secs: {}", config.gps.fix_timeout_secs));
    lines.push(String::new());

    lines.push("dispatch:".into());
    lines.push(format!(
        "  sink_timeout_secs: {}",
        config.dispatch.sink_timeout_secs
    ));

    lines.join("\n") + "\n"
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.feed.port, 30003);
        assert_eq!(config.web.capacity, 25);
        assert_eq!(config.suppression_policy(), SuppressionPolicy::window_secs(600));
        assert!(config.gps.device.is_none());
    }

    #[test]
    fn test_parse_config() {
        let text = r#"
feed:
  host: "192.168.1.20"
  port: 30003

home:
  lat: 35.5   # station
  lon: -82.5

alerts:
  suppression: once
  require_position: true

speech:
  enabled: false
  args: "-a 100"

push:
  url: "https://ntfy.example.com/topic#1"

gps:
  device: "/dev/ttyACM0"
"#;
        let config = parse_config(text).unwrap();
        assert_eq!(config.feed.host, "192.168.1.20");
        assert_eq!(config.home_coord(), Coord::new(35.5, -82.5));
        assert_eq!(config.suppression_policy(), SuppressionPolicy::OncePerRun);
        assert!(config.alerts.require_position);
        assert!(!config.speech.enabled);
        assert_eq!(config.speech.args, vec!["-a", "100"]);
        assert_eq!(config.push.url, "https://ntfy.example.com/topic#1");
        assert_eq!(config.gps.device.as_deref(), Some("/dev/ttyACM0"));
        // untouched sections keep defaults
        assert_eq!(config.web.port, 5001);
    }

    #[test]
    fn test_parse_config_null_values() {
        let text = "gps:\n  device: null\n";
        let config = parse_config(text).unwrap();
        assert!(config.gps.device.is_none());
    }

    #[test]
    fn test_parse_config_errors() {
        assert!(parse_config("feed:\n  port: notanumber\n").is_err());
        assert!(parse_config("feed:\n  colour: blue\n").is_err());
        assert!(parse_config("  port: 1\n").is_err());
        assert!(parse_config("web:\n  enabled: maybe\n").is_err());
    }

    #[test]
    fn test_negative_suppression_rejected() {
        let err = parse_config("alerts:\n  suppression: -60\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
        let config = parse_config("alerts:\n  suppression: 0\n").unwrap();
        assert_eq!(config.suppression_policy(), SuppressionPolicy::window_secs(0));
    }

    #[test]
    fn test_zero_sink_timeout_rejected() {
        assert!(parse_config("dispatch:\n  sink_timeout_secs: 0\n").is_err());
        let config = parse_config("dispatch:\n  sink_timeout_secs: 5\n").unwrap();
        assert_eq!(config.dispatch.sink_timeout_secs, 5);
    }

    #[test]
    fn test_roundtrip() {
        let mut config = Config::default();
        config.alerts.suppression_secs = None;
        config.gps.device = Some("/dev/ttyUSB0".into());
        config.home.lat = 35.25;
        let parsed = parse_config(&serialize_config(&config)).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let mut config = Config::default();
        config.feed.port = 40003;
        save_config(&config, Some(&path)).unwrap();
        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded.feed.port, 40003);
    }

    #[test]
    fn test_load_missing_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(&dir.path().join("absent.yaml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_unreadable_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(dir.path())).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_malformed_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "feed:\n  port: abc\n").unwrap();
        assert!(load_config(Some(&path)).is_err());
    }

    #[test]
    fn test_expand_path() {
        assert_eq!(expand_path("/tmp/x.csv"), PathBuf::from("/tmp/x.csv"));
        assert!(expand_path("~/x.csv").ends_with("x.csv"));
        assert!(!expand_path("~/x.csv").starts_with("~"));
    }
}
