//! Scores crate - coalition-score synchronization core
//!
//! This crate provides the sync core behind the relay service:
//! - OAuth2 token lifecycle with single-flight refresh
//! - Paginated 42 Intra API client with rate-limit backoff
//! - Storage trait abstractions (SQLite and in-memory)
//! - Transactional, idempotent sync engine
//! - Best-effort post-sync notification sinks
//!
//! This crate has no HTTP-server dependencies; the routing layer lives
//! in the relay binary and calls into it.

pub mod config;
pub mod error;
pub mod intra;
pub mod models;
pub mod notify;
pub mod storage;
pub mod sync;

pub use config::ApiConfig;
pub use error::SyncError;
pub use intra::{
    Credential, FetchResult, IntraClient, PageCursor, PageTotals, RetryPolicy, TokenManager,
    DEFAULT_PAGE_SIZE,
};
pub use models::{RawResponse, ScoreRecord};
pub use notify::{LogSink, NotificationSink, SyncEvent};
pub use storage::{InMemoryScoreStore, ScoreStore, SqliteScoreStore};
pub use sync::{sync_scores, ScoreQuery, SyncOutcome};
