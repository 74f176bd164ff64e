//! Append-only CSV log: the durable record of every alert raised.
//!
//! The file is reopened in append mode per row and synced before `send`
//! returns. It is never truncated.

use std::path::PathBuf;

use milwatch_core::AlertRecord;
use tokio::io::AsyncWriteExt;

use super::{Sink, SinkError};

pub const HEADER: &str =
    "timestamp,identifier,callsign,label,category,lat,lon,distance_km,bearing_deg";

/// Quote a field when it holds a comma, quote or line break.
fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// One CSV row, without the trailing newline.
pub fn format_row(record: &AlertRecord) -> String {
    let fields = [
        record.timestamp.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        record.identifier.clone(),
        record.callsign.clone().unwrap_or_default(),
        record.label.clone(),
        record.category.to_string(),
        opt(record.position.map(|p| format!("{:.5}", p.lat))),
        opt(record.position.map(|p| format!("{:.5}", p.lon))),
        opt(record.distance_km.map(|d| format!("{d:.2}"))),
        opt(record.bearing_deg.map(|b| format!("{b:.1}"))),
    ];
    fields.iter().map(|f| escape(f)).collect::<Vec<_>>().join(",")
}

pub struct CsvLogSink {
    path: PathBuf,
}

impl CsvLogSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CsvLogSink { path: path.into() }
    }
}

#[async_trait::async_trait]
impl Sink for CsvLogSink {
    fn name(&self) -> &str {
        "csv-log"
    }

    async fn send(&self, record: &AlertRecord) -> Result<(), SinkError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        let mut out = String::new();
        if file.metadata().await?.len() == 0 {
            out.push_str(HEADER);
            out.push('\n');
        }
        out.push_str(&format_row(record));
        out.push('\n');

        file.write_all(out.as_bytes()).await?;
        file.flush().await?;
        file.sync_data().await?;
        Ok(())
    }

    fn durable(&self) -> bool {
        true
    }
}
