//! In-memory recent-alert buffer backing the web viewer.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use milwatch_core::AlertRecord;

use super::{Sink, SinkError};

/// Bounded list of recent alerts, newest first.
pub struct AlertBuffer {
    capacity: usize,
    alerts: RwLock<VecDeque<AlertRecord>>,
}

impl AlertBuffer {
    pub fn new(capacity: usize) -> Self {
        AlertBuffer {
            capacity: capacity.max(1),
            alerts: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn push(&self, record: AlertRecord) {
        let mut alerts = self.alerts.write().unwrap_or_else(|e| e.into_inner());
        alerts.push_front(record);
        alerts.truncate(self.capacity);
    }

    /// Copy of the current list, newest first.
    pub fn snapshot(&self) -> Vec<AlertRecord> {
        let alerts = self.alerts.read().unwrap_or_else(|e| e.into_inner());
        alerts.iter().cloned().collect()
    }
}

/// Sink that appends to a shared [`AlertBuffer`].
pub struct WebSink {
    buffer: Arc<AlertBuffer>,
}

impl WebSink {
    pub fn new(buffer: Arc<AlertBuffer>) -> Self {
        WebSink { buffer }
    }
}

#[async_trait::async_trait]
impl Sink for WebSink {
    fn name(&self) -> &str {
        "web"
    }

    async fn send(&self, record: &AlertRecord) -> Result<(), SinkError> {
        self.buffer.push(record.clone());
        Ok(())
    }
}
