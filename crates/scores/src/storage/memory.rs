//! In-memory storage implementation
//!
//! Test double honoring the same transactional contract as the SQLite
//! store: a batch either applies completely or not at all.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use serde_json::Value;

use super::traits::ScoreStore;
use crate::error::SyncError;
use crate::models::{RawResponse, ScoreRecord};

/// In-memory implementation of ScoreStore
pub struct InMemoryScoreStore {
    scores: RwLock<HashMap<i64, ScoreRecord>>,
    responses: RwLock<Vec<RawResponse>>,
}

impl InMemoryScoreStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self {
            scores: RwLock::new(HashMap::new()),
            responses: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryScoreStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoreStore for InMemoryScoreStore {
    fn upsert_scores(&self, records: &[ScoreRecord]) -> Result<usize, SyncError> {
        let mut scores = self.scores.write().unwrap();

        // Validate the whole batch against UNIQUE(coalition_id, user_id)
        // before touching anything, to keep all-or-nothing semantics.
        let mut staged = scores.clone();
        for record in records {
            let membership_taken = staged.values().any(|existing| {
                existing.api_id != record.api_id
                    && existing.coalition_id == record.coalition_id
                    && existing.user_id == record.user_id
            });
            if membership_taken {
                return Err(SyncError::storage(format!(
                    "UNIQUE constraint failed for coalition {} user {}",
                    record.coalition_id, record.user_id
                )));
            }
            staged.insert(record.api_id, record.clone());
        }

        *scores = staged;
        Ok(records.len())
    }

    fn get_score(&self, api_id: i64) -> Result<Option<ScoreRecord>, SyncError> {
        Ok(self.scores.read().unwrap().get(&api_id).cloned())
    }

    fn list_scores(&self) -> Result<Vec<ScoreRecord>, SyncError> {
        let mut records: Vec<ScoreRecord> = self.scores.read().unwrap().values().cloned().collect();
        records.sort_by_key(|r| r.api_id);
        Ok(records)
    }

    fn count_scores(&self) -> Result<usize, SyncError> {
        Ok(self.scores.read().unwrap().len())
    }

    fn record_response(&self, endpoint: &str, payload: &Value) -> Result<(), SyncError> {
        let mut responses = self.responses.write().unwrap();
        let id = responses.len() as i64 + 1;
        responses.push(RawResponse {
            id,
            endpoint: endpoint.to_string(),
            payload: payload.clone(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    fn list_responses(&self, limit: usize) -> Result<Vec<RawResponse>, SyncError> {
        let responses = self.responses.read().unwrap();
        Ok(responses.iter().rev().take(limit).cloned().collect())
    }

    fn clear(&self) -> Result<(), SyncError> {
        self.scores.write().unwrap().clear();
        self.responses.write().unwrap().clear();
        Ok(())
    }
}
