//! Problem Pool Store
//!
//! Durable keyed collection of problem records with a consumption flag.
//! `claim_unused` is the only path that flips `consumed`, and it does so in a
//! single conditional UPDATE, so racing claimants never share a record.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use serde_json::Value;
use tracing::{debug, info};

use super::database::{Database, SharedDatabase};
use crate::types::{AllocationKey, PoolError, PoolStats, ProblemRecord, Result, ResultExt};

/// Shared store handle for the allocator
pub type SharedPoolStore = Arc<dyn PoolStore>;

/// Storage contract the allocator depends on
pub trait PoolStore: Send + Sync {
    /// Atomically mark one unused record for `key` as consumed and return it.
    ///
    /// Returns `Ok(None)` when the sub-pool holds no unused record.
    fn claim_unused(&self, key: &AllocationKey) -> Result<Option<ProblemRecord>>;

    /// Append each payload as a new unconsumed record; returns how many were stored.
    fn insert_batch(&self, key: &AllocationKey, payloads: &[Value]) -> Result<usize>;

    /// Per-key unused/consumed counts
    fn stats(&self) -> Result<Vec<PoolStats>>;
}

/// Oldest unused record for the key is claimed first. The outer `consumed = 0`
/// re-check makes the write conditional even if the subquery raced.
const CLAIM_SQL: &str = "
    UPDATE problems
       SET consumed = 1, consumed_at = ?1
     WHERE id = (
               SELECT id FROM problems
                WHERE topic = ?2 AND difficulty = ?3 AND consumed = 0
                ORDER BY created_at, rowid
                LIMIT 1
           )
       AND consumed = 0
    RETURNING id, payload, created_at";

const INSERT_SQL: &str = "
    INSERT INTO problems (id, topic, difficulty, payload, consumed, created_at)
    VALUES (?1, ?2, ?3, ?4, 0, ?5)";

const STATS_SQL: &str = "
    SELECT topic, difficulty,
           SUM(CASE WHEN consumed = 0 THEN 1 ELSE 0 END) AS unused,
           SUM(CASE WHEN consumed = 1 THEN 1 ELSE 0 END) AS consumed
      FROM problems
     GROUP BY topic, difficulty
     ORDER BY topic, difficulty";

/// SQLite-backed pool store
pub struct SqlitePoolStore {
    db: SharedDatabase,
}

impl SqlitePoolStore {
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    /// In-memory store with schema applied, for tests and dry runs
    pub fn in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        db.initialize()?;
        Ok(Self::new(Arc::new(db)))
    }
}

impl PoolStore for SqlitePoolStore {
    fn claim_unused(&self, key: &AllocationKey) -> Result<Option<ProblemRecord>> {
        let conn = self.db.connection()?;
        let consumed_at = Utc::now();

        let row: Option<(String, String, String)> = conn
            .query_row(
                CLAIM_SQL,
                params![
                    consumed_at.to_rfc3339(),
                    key.topic(),
                    key.difficulty().as_str()
                ],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .with_context_fn(|| format!("Failed to claim problem for {}", key))?;

        let Some((id, payload, created_at)) = row else {
            debug!(key = %key, "Sub-pool empty");
            return Ok(None);
        };

        debug!(key = %key, id = %id, "Claimed problem");
        Ok(Some(ProblemRecord {
            id,
            topic: key.topic().to_string(),
            difficulty: key.difficulty(),
            payload: serde_json::from_str(&payload)?,
            consumed: true,
            created_at: parse_timestamp(&created_at)?,
            consumed_at: Some(consumed_at),
        }))
    }

    fn insert_batch(&self, key: &AllocationKey, payloads: &[Value]) -> Result<usize> {
        if payloads.is_empty() {
            return Ok(0);
        }

        let rows = payloads
            .iter()
            .map(|payload| Ok((uuid::Uuid::new_v4().to_string(), serde_json::to_string(payload)?)))
            .collect::<Result<Vec<_>>>()?;
        let created_at = Utc::now().to_rfc3339();
        let topic = key.topic().to_string();
        let difficulty = key.difficulty().as_str();

        let inserted = self.db.transaction(move |conn| {
            let mut stmt = conn.prepare_cached(INSERT_SQL)?;
            let mut inserted = 0;
            for (id, payload) in &rows {
                inserted += stmt.execute(params![id, topic, difficulty, payload, created_at])?;
            }
            Ok(inserted)
        })?;

        info!(key = %key, inserted, "Inserted generated problems");
        Ok(inserted)
    }

    fn stats(&self) -> Result<Vec<PoolStats>> {
        let conn = self.db.connection()?;
        let mut stmt = conn.prepare(STATS_SQL)?;
        let stats = stmt
            .query_map([], |row| {
                Ok(PoolStats {
                    topic: row.get(0)?,
                    difficulty: row.get(1)?,
                    unused: row.get::<_, i64>(2)? as u64,
                    consumed: row.get::<_, i64>(3)? as u64,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(stats)
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| PoolError::Storage(format!("Invalid timestamp '{}': {}", raw, e)))
}
