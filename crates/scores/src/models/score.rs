//! Coalition membership score snapshot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SyncError;

/// One upstream coalition-membership/score snapshot.
///
/// Created on the first sync that observes its `api_id`; later syncs
/// overwrite every non-key field and refresh `fetched_at`. Rows are
/// never deleted by the sync engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    /// Upstream `coalitions_users` row id (unique key)
    pub api_id: i64,
    pub coalition_id: i64,
    pub user_id: i64,
    pub score: i64,
    pub rank: i64,
    /// Upstream creation timestamp
    pub created_at: DateTime<Utc>,
    /// Upstream modification timestamp
    pub updated_at: DateTime<Utc>,
    /// When this snapshot was fetched (stamped once per sync run)
    pub fetched_at: DateTime<Utc>,
}

impl ScoreRecord {
    /// Parse an upstream `coalitions_users` row.
    ///
    /// Numeric fields are required; malformed rows abort the run as a
    /// fetch failure. Upstream timestamps fall back to `fetched_at`
    /// when absent, matching the lenient handling elsewhere upstream.
    pub fn from_api_row(row: &Value, fetched_at: DateTime<Utc>) -> Result<Self, SyncError> {
        Ok(Self {
            api_id: required_i64(row, "id")?,
            coalition_id: required_i64(row, "coalition_id")?,
            user_id: required_i64(row, "user_id")?,
            score: required_i64(row, "score")?,
            rank: required_i64(row, "rank")?,
            created_at: datetime_or(row, "created_at", fetched_at),
            updated_at: datetime_or(row, "updated_at", fetched_at),
            fetched_at,
        })
    }
}

fn required_i64(row: &Value, field: &str) -> Result<i64, SyncError> {
    row.get(field)
        .and_then(Value::as_i64)
        .ok_or_else(|| SyncError::fetch(None, format!("row missing numeric field '{}'", field)))
}

fn datetime_or(row: &Value, field: &str, fallback: DateTime<Utc>) -> DateTime<Utc> {
    row.get(field)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(fallback)
}
