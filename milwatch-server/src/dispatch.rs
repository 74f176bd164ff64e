//! Fan-out of one alert to every registered sink.
//!
//! All sinks run concurrently under a per-sink timeout, and `dispatch`
//! returns only once every attempt has finished or timed out. Failures are
//! logged and reported, never propagated, except that the caller can see
//! whether a durable sink failed.

use std::time::{Duration, Instant};

use futures_util::future::join_all;
use milwatch_core::AlertRecord;

use crate::sinks::{Sink, SinkError};

/// Result of one sink attempt.
#[derive(Debug)]
pub struct SinkOutcome {
    pub sink: String,
    pub durable: bool,
    pub elapsed: Duration,
    pub result: Result<(), SinkError>,
}

/// Outcomes of one dispatch, in registration order.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub outcomes: Vec<SinkOutcome>,
}

impl DispatchReport {
    pub fn attempts(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_err()).count()
    }

    /// First failed durable sink, if any.
    pub fn durable_failure(&self) -> Option<&SinkOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.durable && o.result.is_err())
    }
}

pub struct Dispatcher {
    sinks: Vec<Box<dyn Sink>>,
    sink_timeout: Duration,
}

impl Dispatcher {
    pub fn new(sink_timeout: Duration) -> Self {
        Dispatcher {
            sinks: Vec::new(),
            sink_timeout,
        }
    }

    /// Register a sink. Registration order is report order.
    pub fn register(&mut self, sink: Box<dyn Sink>) {
        tracing::debug!(sink = sink.name(), "Registered sink");
        self.sinks.push(sink);
    }

    pub fn with_sink(mut self, sink: impl Sink + 'static) -> Self {
        self.register(Box::new(sink));
        self
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Deliver `record` to every sink.
    pub async fn dispatch(&self, record: &AlertRecord) -> DispatchReport {
        let attempts = self.sinks.iter().map(|sink| async move {
            let started = Instant::now();
            let result = match tokio::time::timeout(self.sink_timeout, sink.send(record)).await {
                Ok(result) => result,
                Err(_) => Err(SinkError::Timeout(self.sink_timeout)),
            };
            SinkOutcome {
                sink: sink.name().to_string(),
                durable: sink.durable(),
                elapsed: started.elapsed(),
                result,
            }
        });

        let outcomes = join_all(attempts).await;

        for outcome in &outcomes {
            match &outcome.result {
                Ok(()) => tracing::debug!(
                    sink = %outcome.sink,
                    identifier = %record.identifier,
                    elapsed_ms = outcome.elapsed.as_millis() as u64,
                    "Sink delivered alert"
                ),
                Err(e) if outcome.durable => tracing::error!(
                    sink = %outcome.sink,
                    identifier = %record.identifier,
                    error = %e,
                    "Durable sink failed"
                ),
                Err(e) => tracing::warn!(
                    sink = %outcome.sink,
                    identifier = %record.identifier,
                    error = %e,
                    "Sink failed"
                ),
            }
        }

        DispatchReport { outcomes }
    }
}
