//! Sync engine for fetching and storing coalition scores
//!
//! Provides idempotent sync operations that can be safely retried.

mod query;
mod scores;

pub use query::ScoreQuery;
pub use scores::{sync_scores, SyncOutcome};
