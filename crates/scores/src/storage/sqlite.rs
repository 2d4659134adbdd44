//! SQLite-backed score storage

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rusqlite_migration::{Migrations, M};
use serde_json::Value;

use super::traits::ScoreStore;
use crate::error::SyncError;
use crate::models::{RawResponse, ScoreRecord};

/// Database migrations
///
/// Each migration is applied in order. The user_version pragma tracks
/// which migrations have been applied.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: score snapshots and the raw-response audit log
        M::up(
            r#"
            -- One row per upstream coalitions_users record. api_id is the
            -- upstream key; (coalition_id, user_id) mirrors the upstream
            -- one-membership-per-user constraint.
            CREATE TABLE coalition_scores (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                api_id INTEGER NOT NULL UNIQUE,
                coalition_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                score INTEGER NOT NULL,
                "rank" INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                fetched_at TEXT NOT NULL,
                UNIQUE(coalition_id, user_id)
            );

            CREATE INDEX idx_coalition_scores_coalition
                ON coalition_scores(coalition_id);
            CREATE INDEX idx_coalition_scores_user
                ON coalition_scores(user_id);

            -- Append-only audit log for proxied raw fetches
            CREATE TABLE responses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                endpoint TEXT NOT NULL,
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX idx_responses_created_at
                ON responses(created_at DESC);
            "#,
        ),
    ])
}

/// SQLite-backed score storage
///
/// A single connection behind a mutex; batch upserts run in one
/// transaction so a failed row leaves the table untouched.
pub struct SqliteScoreStore {
    conn: Mutex<Connection>,
}

impl SqliteScoreStore {
    /// Open (or create) the database at `db_path` and run migrations.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, SyncError> {
        let conn = Connection::open(db_path.as_ref()).map_err(|e| {
            SyncError::storage(format!(
                "failed to open database at {:?}: {}",
                db_path.as_ref(),
                e
            ))
        })?;
        Self::with_connection(conn)
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self, SyncError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(mut conn: Connection) -> Result<Self, SyncError> {
        // WAL keeps readers unblocked during sync commits; NORMAL sync
        // is safe in WAL mode.
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            "#,
        )?;

        migrations()
            .to_latest(&mut conn)
            .map_err(|e| SyncError::storage(format!("failed to run database migrations: {}", e)))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn read_record(row: &Row<'_>) -> rusqlite::Result<ScoreRecord> {
        Ok(ScoreRecord {
            api_id: row.get(0)?,
            coalition_id: row.get(1)?,
            user_id: row.get(2)?,
            score: row.get(3)?,
            rank: row.get(4)?,
            created_at: parse_datetime(&row.get::<_, String>(5)?),
            updated_at: parse_datetime(&row.get::<_, String>(6)?),
            fetched_at: parse_datetime(&row.get::<_, String>(7)?),
        })
    }
}

const RECORD_COLUMNS: &str =
    r#"api_id, coalition_id, user_id, score, "rank", created_at, updated_at, fetched_at"#;

fn parse_datetime(text: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl ScoreStore for SqliteScoreStore {
    fn upsert_scores(&self, records: &[ScoreRecord]) -> Result<usize, SyncError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let applied = (|| -> Result<(), SyncError> {
            // ON CONFLICT DO UPDATE rather than INSERT OR REPLACE: the
            // latter deletes the old row first and would churn rowids.
            let mut stmt = tx.prepare(
                r#"INSERT INTO coalition_scores
                   (api_id, coalition_id, user_id, score, "rank",
                    created_at, updated_at, fetched_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                   ON CONFLICT(api_id) DO UPDATE SET
                      coalition_id = excluded.coalition_id,
                      user_id = excluded.user_id,
                      score = excluded.score,
                      "rank" = excluded."rank",
                      created_at = excluded.created_at,
                      updated_at = excluded.updated_at,
                      fetched_at = excluded.fetched_at"#,
            )?;

            for record in records {
                stmt.execute(params![
                    record.api_id,
                    record.coalition_id,
                    record.user_id,
                    record.score,
                    record.rank,
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                    record.fetched_at.to_rfc3339(),
                ])?;
            }
            Ok(())
        })();

        match applied {
            Ok(()) => {
                tx.commit()?;
                Ok(records.len())
            }
            Err(err) => {
                // Roll back explicitly so a rollback failure is at least
                // logged; the original error is the one surfaced.
                if let Err(rollback_err) = tx.rollback() {
                    log::warn!("rollback after failed upsert also failed: {}", rollback_err);
                }
                Err(err)
            }
        }
    }

    fn get_score(&self, api_id: i64) -> Result<Option<ScoreRecord>, SyncError> {
        let conn = self.conn.lock().unwrap();
        let record = conn
            .query_row(
                &format!(
                    "SELECT {} FROM coalition_scores WHERE api_id = ?",
                    RECORD_COLUMNS
                ),
                [api_id],
                Self::read_record,
            )
            .optional()?;
        Ok(record)
    }

    fn list_scores(&self) -> Result<Vec<ScoreRecord>, SyncError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM coalition_scores ORDER BY api_id",
            RECORD_COLUMNS
        ))?;
        let records = stmt
            .query_map([], Self::read_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn count_scores(&self) -> Result<usize, SyncError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM coalition_scores", [], |row| {
            row.get(0)
        })?;
        Ok(count as usize)
    }

    fn record_response(&self, endpoint: &str, payload: &Value) -> Result<(), SyncError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO responses (endpoint, payload, created_at) VALUES (?, ?, ?)",
            params![endpoint, payload.to_string(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn list_responses(&self, limit: usize) -> Result<Vec<RawResponse>, SyncError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, endpoint, payload, created_at FROM responses
             ORDER BY id DESC LIMIT ?",
        )?;
        let responses = stmt
            .query_map([limit as i64], |row| {
                let payload_text: String = row.get(2)?;
                Ok(RawResponse {
                    id: row.get(0)?,
                    endpoint: row.get(1)?,
                    payload: serde_json::from_str(&payload_text).unwrap_or(Value::Null),
                    created_at: parse_datetime(&row.get::<_, String>(3)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(responses)
    }

    fn clear(&self) -> Result<(), SyncError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM coalition_scores", [])?;
        conn.execute("DELETE FROM responses", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn make_record(api_id: i64, coalition_id: i64, user_id: i64, score: i64) -> ScoreRecord {
        let now = Utc::now();
        ScoreRecord {
            api_id,
            coalition_id,
            user_id,
            score,
            rank: 1,
            created_at: now - Duration::days(30),
            updated_at: now,
            fetched_at: now,
        }
    }

    #[test]
    fn test_upsert_inserts_and_overwrites() {
        let store = SqliteScoreStore::open_in_memory().unwrap();

        let first = make_record(1, 53, 77, 100);
        store.upsert_scores(std::slice::from_ref(&first)).unwrap();
        assert_eq!(store.count_scores().unwrap(), 1);

        let mut second = first.clone();
        second.score = 250;
        second.rank = 2;
        second.fetched_at = first.fetched_at + Duration::seconds(60);
        store.upsert_scores(std::slice::from_ref(&second)).unwrap();

        // Still one row, with all non-key fields overwritten and
        // fetched_at refreshed.
        assert_eq!(store.count_scores().unwrap(), 1);
        let stored = store.get_score(1).unwrap().unwrap();
        assert_eq!(stored.score, 250);
        assert_eq!(stored.rank, 2);
        assert_eq!(
            stored.fetched_at.to_rfc3339(),
            second.fetched_at.to_rfc3339()
        );
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let store = SqliteScoreStore::open_in_memory().unwrap();
        let records = vec![make_record(1, 53, 77, 100), make_record(2, 53, 78, 90)];

        store.upsert_scores(&records).unwrap();
        let after_first = store.list_scores().unwrap();

        store.upsert_scores(&records).unwrap();
        let after_second = store.list_scores().unwrap();

        assert_eq!(after_first, after_second);
    }

    #[test]
    fn test_failed_batch_rolls_back_completely() {
        let store = SqliteScoreStore::open_in_memory().unwrap();

        // Seed 10 existing rows.
        let seeded: Vec<ScoreRecord> = (1..=10)
            .map(|i| make_record(i, 53, 100 + i, i * 10))
            .collect();
        store.upsert_scores(&seeded).unwrap();
        let before = store.list_scores().unwrap();
        assert_eq!(before.len(), 10);

        // 20 incoming rows where row 7 violates UNIQUE(coalition_id,
        // user_id): a new api_id claiming a membership that api_id 1
        // already holds.
        let incoming: Vec<ScoreRecord> = (0..20)
            .map(|i| {
                if i == 6 {
                    make_record(1000, 53, 101, 999)
                } else {
                    make_record(200 + i, 60, 500 + i, i)
                }
            })
            .collect();

        let err = store.upsert_scores(&incoming).unwrap_err();
        assert_eq!(err.kind(), "db_failed");

        // The table is exactly what it was before the failed run.
        assert_eq!(store.list_scores().unwrap(), before);
    }

    #[test]
    fn test_response_audit_log() {
        let store = SqliteScoreStore::open_in_memory().unwrap();
        store
            .record_response("/v2/me", &serde_json::json!({"login": "marvin"}))
            .unwrap();
        store
            .record_response("/v2/campus", &serde_json::json!([{"id": 12}]))
            .unwrap();

        let responses = store.list_responses(10).unwrap();
        assert_eq!(responses.len(), 2);
        // Newest first
        assert_eq!(responses[0].endpoint, "/v2/campus");
        assert_eq!(responses[1].payload["login"], "marvin");
    }

    #[test]
    fn test_empty_batch_is_a_noop() {
        let store = SqliteScoreStore::open_in_memory().unwrap();
        assert_eq!(store.upsert_scores(&[]).unwrap(), 0);
        assert_eq!(store.count_scores().unwrap(), 0);
    }
}
