//! Post-sync notification sink
//!
//! Sinks receive a summary after a successful sync run. Delivery is
//! best-effort and at-most-once; sync correctness never depends on it.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Summary of one completed sync run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncEvent {
    /// Which query variant produced the run
    pub query: String,
    pub stored: usize,
    pub pages_fetched: u32,
    pub completed_at: DateTime<Utc>,
}

/// Receiver for post-sync summaries.
pub trait NotificationSink: Send + Sync {
    fn publish(&self, event: &SyncEvent);
}

/// Sink that logs sync summaries at INFO.
pub struct LogSink;

impl NotificationSink for LogSink {
    fn publish(&self, event: &SyncEvent) {
        log::info!(
            "sync '{}' stored {} rows from {} pages",
            event.query,
            event.stored,
            event.pages_fetched
        );
    }
}
