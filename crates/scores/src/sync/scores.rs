//! Score sync implementation

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;

use super::ScoreQuery;
use crate::error::SyncError;
use crate::intra::{IntraClient, DEFAULT_PAGE_SIZE};
use crate::models::ScoreRecord;
use crate::notify::{NotificationSink, SyncEvent};
use crate::storage::ScoreStore;

/// Result summary of a sync run
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    /// Number of distinct rows merged into storage
    pub stored: usize,
    /// Pages actually requested from upstream
    pub pages_fetched: u32,
    /// Total pages the server reported, when it did
    pub reported_total_pages: Option<u32>,
    /// Duration of the run
    pub duration_ms: u64,
}

/// Run one sync: fetch every page of the query's collection, then merge
/// all rows into storage as a single transaction.
///
/// This operation is idempotent - running it twice against unchanged
/// upstream data leaves the stored table identical. A failure at any
/// point (fetch or storage) leaves the table untouched; the engine
/// never partially commits. An empty upstream result is success with
/// `stored = 0`.
///
/// `token_override` uses a caller-provided bearer token for the run
/// instead of the cached credential; it is never stored.
pub fn sync_scores(
    client: &IntraClient,
    store: &dyn ScoreStore,
    sink: Option<&dyn NotificationSink>,
    query: &ScoreQuery,
    token_override: Option<&str>,
) -> Result<SyncOutcome, SyncError> {
    query.validate()?;

    let start = Instant::now();
    let fetched = client.fetch_all(
        &query.path(),
        &query.params(),
        DEFAULT_PAGE_SIZE,
        query.max_pages(),
        token_override,
    )?;

    // Dedup by upstream key; later pages win. The stored count is the
    // number of distinct api_ids observed, not the raw row count.
    let fetched_at = Utc::now();
    let mut by_api_id: BTreeMap<i64, ScoreRecord> = BTreeMap::new();
    for row in &fetched.rows {
        let record = ScoreRecord::from_api_row(row, fetched_at)?;
        by_api_id.insert(record.api_id, record);
    }
    let records: Vec<ScoreRecord> = by_api_id.into_values().collect();

    // One transaction for the whole batch; the store rolls back on any
    // failed row and the error propagates unchanged.
    let stored = store.upsert_scores(&records)?;

    let outcome = SyncOutcome {
        stored,
        pages_fetched: fetched.pages_fetched,
        reported_total_pages: fetched.reported_total_pages,
        duration_ms: start.elapsed().as_millis() as u64,
    };

    log::info!(
        "sync '{}' complete: {} rows stored, {} pages fetched in {}ms",
        query.label(),
        outcome.stored,
        outcome.pages_fetched,
        outcome.duration_ms
    );

    if let Some(sink) = sink {
        sink.publish(&SyncEvent {
            query: query.label().to_string(),
            stored: outcome.stored,
            pages_fetched: outcome.pages_fetched,
            completed_at: fetched_at,
        });
    }

    Ok(outcome)
}
