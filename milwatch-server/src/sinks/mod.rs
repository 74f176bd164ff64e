//! Alert delivery channels.
//!
//! Every sink implements [`Sink`]. The dispatcher owns them as
//! `Box<dyn Sink>` in registration order and fans each alert out to all of
//! them; a failure in one never reaches the others.

use std::time::Duration;

use milwatch_core::AlertRecord;
use thiserror::Error;

pub mod console;
pub mod csv_log;
pub mod push;
pub mod speech;
pub mod web;

pub use console::ConsoleSink;
pub use csv_log::CsvLogSink;
pub use push::PushSink;
pub use speech::SpeechSink;
pub use web::{AlertBuffer, WebSink};

/// Why a sink could not deliver an alert.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}")]
    NonZeroExit { program: String, status: String },
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP status {0}")]
    HttpStatus(u16),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// An independent alert-delivery channel.
#[async_trait::async_trait]
pub trait Sink: Send + Sync {
    /// Short name used in logs and the self-test report.
    fn name(&self) -> &str;

    /// Deliver one alert.
    async fn send(&self, record: &AlertRecord) -> Result<(), SinkError>;

    /// A durable sink's failure is escalated instead of swallowed.
    fn durable(&self) -> bool {
        false
    }
}
