//! Pipeline driver: feed lines in, alerts out.
//!
//! One line is parsed, evaluated and dispatched before the next is read.
//! The stop signal is only checked between lines, so an alert that has
//! been raised always reaches every sink.

use std::time::Duration;

use chrono::{DateTime, Utc};
use milwatch_core::sbs;
use milwatch_core::tracker::STALE_TIMEOUT_SECS;
use milwatch_core::{AircraftObservation, AlertRecord, AlertTracker};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use crate::dispatch::{DispatchReport, Dispatcher};

/// Longest feed line accepted. Real SBS lines are well under 200 bytes.
const MAX_LINE_BYTES: u64 = 4096;

/// Read up to one line, at most [`MAX_LINE_BYTES`]. `None` when stopped.
async fn read_capped<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    stop: &CancellationToken,
) -> std::io::Result<Option<usize>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let mut limited = (&mut *reader).take(MAX_LINE_BYTES);
    tokio::select! {
        read = limited.read_until(b'\n', buf) => read.map(Some),
        _ = stop.cancelled() => Ok(None),
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("feed read failed: {0}")]
    Feed(#[from] std::io::Error),
    #[error("durable sink {sink} failed: {reason}")]
    DurableSink { sink: String, reason: String },
}

/// Why a stream stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    Eof,
    Stopped,
}

/// Line-level counters for one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    pub lines: u64,
    pub parse_errors: u64,
    pub alerts: u64,
}

pub struct Pipeline {
    tracker: AlertTracker,
    dispatcher: Dispatcher,
    stats: PipelineStats,
    last_prune: Option<DateTime<Utc>>,
}

impl Pipeline {
    pub fn new(tracker: AlertTracker, dispatcher: Dispatcher) -> Self {
        Pipeline {
            tracker,
            dispatcher,
            stats: PipelineStats::default(),
            last_prune: None,
        }
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn tracker(&self) -> &AlertTracker {
        &self.tracker
    }

    /// Parse and process one feed line. Malformed lines are logged and skipped.
    pub async fn process_line(
        &mut self,
        line: &str,
    ) -> Result<Option<(AlertRecord, DispatchReport)>, PipelineError> {
        self.stats.lines += 1;
        match sbs::parse(line) {
            Ok(obs) => self.process_observation(&obs).await,
            Err(e) => {
                self.stats.parse_errors += 1;
                tracing::debug!(error = %e, line = line.trim_end(), "Skipping feed line");
                Ok(None)
            }
        }
    }

    /// Evaluate an observation and dispatch any resulting alert.
    ///
    /// A failed durable sink is escalated as an error after the other
    /// sinks have run.
    pub async fn process_observation(
        &mut self,
        obs: &AircraftObservation,
    ) -> Result<Option<(AlertRecord, DispatchReport)>, PipelineError> {
        self.maybe_prune(obs.timestamp);

        let Some(record) = self.tracker.evaluate(obs) else {
            return Ok(None);
        };
        self.stats.alerts += 1;
        tracing::info!(
            identifier = %record.identifier,
            callsign = record.callsign.as_deref().unwrap_or(""),
            label = %record.label,
            category = %record.category,
            "Alert raised"
        );

        let report = self.dispatcher.dispatch(&record).await;
        tracing::debug!(
            attempts = report.attempts() as u64,
            failures = report.failures() as u64,
            "Dispatch complete"
        );
        if let Some(failed) = report.durable_failure() {
            let reason = match &failed.result {
                Err(e) => e.to_string(),
                Ok(()) => String::new(),
            };
            return Err(PipelineError::DurableSink {
                sink: failed.sink.clone(),
                reason,
            });
        }
        Ok(Some((record, report)))
    }

    fn maybe_prune(&mut self, now: DateTime<Utc>) {
        let due = match self.last_prune {
            Some(last) => (now - last).num_seconds() >= STALE_TIMEOUT_SECS,
            None => true,
        };
        if due {
            let removed = self.tracker.prune_stale(now);
            if removed > 0 {
                tracing::debug!(
                    removed = removed as u64,
                    tracked = self.tracker.tracked_count() as u64,
                    "Pruned stale aircraft"
                );
            }
            self.last_prune = Some(now);
        }
    }

    /// Process lines until EOF or the stop signal.
    pub async fn run_stream<R>(
        &mut self,
        mut reader: R,
        stop: &CancellationToken,
    ) -> Result<StreamEnd, PipelineError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut buf = Vec::new();
        loop {
            if stop.is_cancelled() {
                return Ok(StreamEnd::Stopped);
            }
            let Some(read) = read_capped(&mut reader, &mut buf, stop).await? else {
                return Ok(StreamEnd::Stopped);
            };
            if read == 0 {
                return Ok(StreamEnd::Eof);
            }
            if buf.last() != Some(&b'\n') && read as u64 == MAX_LINE_BYTES {
                self.stats.lines += 1;
                self.stats.parse_errors += 1;
                tracing::warn!(limit = MAX_LINE_BYTES, "Overlong feed line discarded");
                loop {
                    let Some(read) = read_capped(&mut reader, &mut buf, stop).await? else {
                        return Ok(StreamEnd::Stopped);
                    };
                    if read == 0 {
                        return Ok(StreamEnd::Eof);
                    }
                    if buf.last() == Some(&b'\n') {
                        break;
                    }
                }
                continue;
            }
            let line = String::from_utf8_lossy(&buf);
            if line.trim().is_empty() {
                continue;
            }
            self.process_line(&line).await?;
        }
    }

    /// Read the TCP feed until stopped, reconnecting after `reconnect`
    /// whenever the connection fails or closes.
    pub async fn run_feed(
        &mut self,
        host: &str,
        port: u16,
        reconnect: Duration,
        stop: &CancellationToken,
    ) -> Result<(), PipelineError> {
        let addr = format!("{host}:{port}");
        loop {
            if stop.is_cancelled() {
                return Ok(());
            }

            match TcpStream::connect(&addr).await {
                Ok(stream) => {
                    tracing::info!(%addr, "Connected to feed");
                    match self.run_stream(BufReader::new(stream), stop).await {
                        Ok(StreamEnd::Stopped) => return Ok(()),
                        Ok(StreamEnd::Eof) => tracing::warn!(%addr, "Feed closed"),
                        Err(PipelineError::Feed(e)) => {
                            tracing::warn!(%addr, error = %e, "Feed read failed")
                        }
                        Err(e) => return Err(e),
                    }
                }
                Err(e) => tracing::warn!(%addr, error = %e, "Feed connection failed"),
            }

            tracing::info!(retry_secs = reconnect.as_secs(), "Reconnecting to feed");
            tokio::select! {
                _ = tokio::time::sleep(reconnect) => {}
                _ = stop.cancelled() => return Ok(()),
            }
        }
    }

    /// Log the run summary.
    pub fn log_summary(&self) {
        tracing::info!(
            lines = self.stats.lines,
            parse_errors = self.stats.parse_errors,
            alerts = self.stats.alerts,
            suppressed = self.tracker.suppressed,
            deferred = self.tracker.deferred,
            "Pipeline finished"
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
