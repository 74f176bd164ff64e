//! Push notifications over HTTP to an ntfy-style topic URL.

use std::time::Duration;

use milwatch_core::AlertRecord;

use super::{Sink, SinkError};

/// Notification title: "Alert: RCH456 (14.0 km)".
pub fn title(record: &AlertRecord) -> String {
    format!("Alert: {} ({})", record.display_name(), record.distance_text())
}

/// Notification body.
pub fn body(record: &AlertRecord) -> String {
    format!(
        "{} | {} | {}\nICAO: {} ({})",
        record.altitude_text(),
        record.speed_text(),
        record.bearing_text(),
        record.identifier,
        record.label
    )
}

/// Posts each alert to a topic URL with `Title` and `Actions` headers.
pub struct PushSink {
    url: String,
    client: reqwest::Client,
}

impl PushSink {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(PushSink {
            url: url.to_string(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl Sink for PushSink {
    fn name(&self) -> &str {
        "push"
    }

    async fn send(&self, record: &AlertRecord) -> Result<(), SinkError> {
        let response = self
            .client
            .post(&self.url)
            .header("Title", title(record))
            .header("Actions", format!("view, Track, {}", record.map_link()))
            .body(body(record))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::HttpStatus(status.as_u16()));
        }
        Ok(())
    }
}
