//! Console sink: a plain-text alert banner on stdout.

use milwatch_core::AlertRecord;

use super::{Sink, SinkError};

/// Prints an alert banner to stdout.
pub struct ConsoleSink;

/// Multi-line banner shown on the terminal.
pub fn format_banner(record: &AlertRecord) -> String {
    let mut lines = vec![
        "=".repeat(60),
        format!("  ALERT: {} [{}]", record.display_name(), record.label),
        format!(
            "  {} | {} | {}",
            record.identifier,
            record.category,
            record.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        format!("  {} | {}", record.altitude_text(), record.speed_text()),
        format!("  {} at {}", record.distance_text(), record.bearing_text()),
    ];
    if let Some(pos) = record.position {
        lines.push(format!("  Position: {:.4}, {:.4}", pos.lat, pos.lon));
    }
    lines.push(format!(
        "  Reference: {:.4}, {:.4} ({})",
        record.reference.lat, record.reference.lon, record.reference.source
    ));
    lines.push(format!("  Track: {}", record.map_link()));
    lines.push("=".repeat(60));
    lines.join("\n")
}

#[async_trait::async_trait]
impl Sink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    async fn send(&self, record: &AlertRecord) -> Result<(), SinkError> {
        println!("{}", format_banner(record));
        Ok(())
    }
}
