//! Storage trait definitions

use serde_json::Value;

use crate::error::SyncError;
use crate::models::{RawResponse, ScoreRecord};

/// Trait for score storage operations
///
/// Abstracts over the SQLite store and the in-memory test double. The
/// transactional contract lives here: `upsert_scores` merges a whole
/// batch or nothing.
pub trait ScoreStore: Send + Sync {
    /// Merge a batch of score records in a single transaction.
    ///
    /// Each record is upserted keyed on `api_id`: inserted when absent,
    /// otherwise every non-key field is overwritten and `fetched_at`
    /// refreshed. If any row fails the whole batch rolls back and the
    /// stored table is unchanged. Returns the number of rows merged.
    fn upsert_scores(&self, records: &[ScoreRecord]) -> Result<usize, SyncError>;

    /// Get a score record by its upstream id
    fn get_score(&self, api_id: i64) -> Result<Option<ScoreRecord>, SyncError>;

    /// List all score records, ordered by api_id
    fn list_scores(&self) -> Result<Vec<ScoreRecord>, SyncError>;

    /// Count stored score records
    fn count_scores(&self) -> Result<usize, SyncError>;

    /// Append a raw fetch result to the audit log
    fn record_response(&self, endpoint: &str, payload: &Value) -> Result<(), SyncError>;

    /// List the most recent audit entries, newest first
    fn list_responses(&self, limit: usize) -> Result<Vec<RawResponse>, SyncError>;

    /// Clear all data (for testing)
    fn clear(&self) -> Result<(), SyncError>;
}
