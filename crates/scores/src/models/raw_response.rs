//! Append-only audit record for raw API fetches

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One raw fetch result, kept for endpoints that are proxied rather
/// than merged into the structured score table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawResponse {
    pub id: i64,
    pub endpoint: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}
