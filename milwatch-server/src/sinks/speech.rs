//! Spoken alerts through an external text-to-speech program.
//!
//! The program receives the sentence as its last argument. The child is
//! created with `kill_on_drop`, so it is reaped on every exit path,
//! including the timeout.

use std::process::Stdio;
use std::time::Duration;

use milwatch_core::AlertRecord;
use tokio::process::Command;

use super::{Sink, SinkError};

const PHONETIC: [&str; 26] = [
    "Alpha", "Bravo", "Charlie", "Delta", "Echo", "Foxtrot", "Golf", "Hotel", "India", "Juliett",
    "Kilo", "Lima", "Mike", "November", "Oscar", "Papa", "Quebec", "Romeo", "Sierra", "Tango",
    "Uniform", "Victor", "Whiskey", "X-ray", "Yankee", "Zulu",
];

const DIGITS: [&str; 10] = [
    "Zero", "One", "Two", "Three", "Four", "Five", "Six", "Seven", "Eight", "Nine",
];

/// Spell a callsign with the ICAO phonetic alphabet: "RCH4" -> "Romeo Charlie Hotel Four".
pub fn phonetic(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| {
            let c = c.to_ascii_uppercase();
            match c {
                'A'..='Z' => PHONETIC[(c as u8 - b'A') as usize].to_string(),
                '0'..='9' => DIGITS[(c as u8 - b'0') as usize].to_string(),
                other => other.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// The sentence handed to the speech program.
pub fn sentence(record: &AlertRecord) -> String {
    let mut s = format!(
        "Aircraft, {}, reason {}",
        phonetic(record.display_name()),
        record.label
    );

    let mut details = Vec::new();
    if let Some(alt) = record.altitude_ft {
        details.push(format!("flying at an altitude of {alt} feet"));
    }
    if let Some(speed) = record.speed_kts {
        details.push(format!("traveling at a speed of {speed:.0} knots"));
    }
    if !details.is_empty() {
        s.push_str(", has been detected ");
        s.push_str(&details.join(", "));
    }
    s.push('.');

    if let (Some(km), Some(deg), Some(name)) =
        (record.distance_km, record.bearing_deg, record.compass_name())
    {
        s.push_str(&format!(
            " {km:.1} kilometers and {} degrees {name} from your current location.",
            deg.round() as i64 % 360
        ));
    }
    s
}

pub struct SpeechSink {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl SpeechSink {
    pub fn new(program: &str, args: Vec<String>, timeout: Duration) -> Self {
        SpeechSink {
            program: program.to_string(),
            args,
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl Sink for SpeechSink {
    fn name(&self) -> &str {
        "speech"
    }

    async fn send(&self, record: &AlertRecord) -> Result<(), SinkError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(sentence(record))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SinkError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                if let Err(e) = child.kill().await {
                    tracing::debug!(program = %self.program, error = %e, "kill after timeout failed");
                }
                return Err(SinkError::Timeout(self.timeout));
            }
        };

        if !status.success() {
            return Err(SinkError::NonZeroExit {
                program: self.program.clone(),
                status: status.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::web::tests::sample;

    #[test]
    fn test_phonetic() {
        assert_eq!(phonetic("RCH4"), "Romeo Charlie Hotel Four");
        assert_eq!(phonetic("ae-1"), "Alpha Echo - One");
    }

    #[test]
    fn test_sentence_without_location() {
        let r = sample("AE0200");
        assert_eq!(
            sentence(&r),
            "Aircraft, Alpha Echo Zero Two Zero Zero, reason US Air Force."
        );
    }

    #[test]
    fn test_sentence_with_details() {
        let mut r = sample("AE0200");
        r.callsign = Some("RCH456".into());
        r.altitude_ft = Some(24000);
        r.speed_kts = Some(420.0);
        r.distance_km = Some(14.04);
        r.bearing_deg = Some(45.2);
        let s = sentence(&r);
        assert!(s.starts_with("Aircraft, Romeo Charlie Hotel Four Five Six, reason US Air Force"));
        assert!(s.contains("altitude of 24000 feet, traveling at a speed of 420 knots."));
        assert!(s.ends_with("14.0 kilometers and 45 degrees North-East from your current location."));
    }

    #[tokio::test]
    async fn test_successful_program() {
        let sink = SpeechSink::new("true", vec![], Duration::from_secs(5));
        assert!(sink.send(&sample("AE0200")).await.is_ok());
    }

    #[tokio::test]
    async fn test_non_zero_exit() {
        let sink = SpeechSink::new("false", vec![], Duration::from_secs(5));
        let err = sink.send(&sample("AE0200")).await.unwrap_err();
        assert!(matches!(err, SinkError::NonZeroExit { .. }));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let sink = SpeechSink::new("milwatch-no-such-program", vec![], Duration::from_secs(5));
        let err = sink.send(&sample("AE0200")).await.unwrap_err();
        assert!(matches!(err, SinkError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let sink = SpeechSink::new(
            "sh",
            vec!["-c".into(), "sleep 5".into()],
            Duration::from_millis(100),
        );
        let started = std::time::Instant::now();
        let err = sink.send(&sample("AE0200")).await.unwrap_err();
        assert!(matches!(err, SinkError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
