//! Batch run with per-key memoization
//!
//! Serves a sequence of work units, each naming an allocation key. A key is
//! acquired at most once per run and the result is reused for every later
//! unit with the same key; a failed key stays failed for the rest of the run.
//! Unavailable keys are skipped, never aborting the run.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use serde::Serialize;
use tracing::{info, warn};

use super::Allocator;
use crate::types::{AllocationKey, ProblemRecord, Result};

/// One unit of work: a recipient identifier and the key it needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    pub id: String,
    pub key: AllocationKey,
}

impl WorkUnit {
    pub fn new(id: impl Into<String>, key: AllocationKey) -> Self {
        Self { id: id.into(), key }
    }
}

/// What a unit received
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitOutcome {
    Served {
        problem_id: String,
        title: Option<String>,
    },
    Skipped {
        reason: String,
    },
}

/// Per-unit line of the report
#[derive(Debug, Clone, Serialize)]
pub struct UnitResult {
    pub unit_id: String,
    pub key: String,
    #[serde(flatten)]
    pub outcome: UnitOutcome,
}

/// Summary of one batch run
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub served: usize,
    pub skipped: usize,
    pub distinct_keys: usize,
    pub refills: usize,
    pub duration_ms: u64,
    pub results: Vec<UnitResult>,
}

#[derive(Debug, Clone)]
enum Memo {
    Acquired(Arc<ProblemRecord>),
    Unavailable(String),
}

/// Runs work units against one allocator, memoizing per key for the run
pub struct BatchRunner<'a> {
    allocator: &'a Allocator,
    memo: DashMap<AllocationKey, Memo>,
    refills: AtomicUsize,
}

impl<'a> BatchRunner<'a> {
    pub fn new(allocator: &'a Allocator) -> Self {
        Self {
            allocator,
            memo: DashMap::new(),
            refills: AtomicUsize::new(0),
        }
    }

    /// Problem for `key`, acquiring on first use within this run.
    ///
    /// `Ok(None)` means the key is unavailable for the rest of the run.
    pub async fn problem_for(&self, key: &AllocationKey) -> Result<Option<Arc<ProblemRecord>>> {
        if let Some(memo) = self.memo.get(key) {
            return Ok(match memo.value() {
                Memo::Acquired(record) => Some(Arc::clone(record)),
                Memo::Unavailable(_) => None,
            });
        }

        let memo = match self.allocator.acquire_with_deadline(key).await {
            Ok(acquisition) => {
                if acquisition.refilled {
                    self.refills.fetch_add(1, Ordering::Relaxed);
                }
                Memo::Acquired(Arc::new(acquisition.record))
            }
            Err(e) if e.is_skippable() => Memo::Unavailable(e.to_string()),
            Err(e) => return Err(e),
        };

        // First writer wins if two callers raced on the same key
        let stored = self.memo.entry(key.clone()).or_insert(memo).value().clone();
        Ok(match stored {
            Memo::Acquired(record) => Some(record),
            Memo::Unavailable(_) => None,
        })
    }

    fn skip_reason(&self, key: &AllocationKey) -> String {
        self.memo
            .get(key)
            .and_then(|m| match m.value() {
                Memo::Unavailable(reason) => Some(reason.clone()),
                Memo::Acquired(_) => None,
            })
            .unwrap_or_else(|| "unavailable".to_string())
    }

    /// Serve every unit in order
    pub async fn run(&self, units: &[WorkUnit]) -> Result<BatchReport> {
        let start = Instant::now();
        let mut report = BatchReport::default();

        for unit in units {
            let outcome = match self.problem_for(&unit.key).await {
                Ok(Some(record)) => {
                    report.served += 1;
                    UnitOutcome::Served {
                        problem_id: record.id.clone(),
                        title: record.title().map(str::to_string),
                    }
                }
                Ok(None) => {
                    report.skipped += 1;
                    let reason = self.skip_reason(&unit.key);
                    warn!(unit = %unit.id, key = %unit.key, "Skipping unit: {}", reason);
                    UnitOutcome::Skipped { reason }
                }
                Err(e) => return Err(e),
            };

            report.results.push(UnitResult {
                unit_id: unit.id.clone(),
                key: unit.key.to_string(),
                outcome,
            });
        }

        report.distinct_keys = self.memo.len();
        report.refills = self.refills.load(Ordering::Relaxed);
        report.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            served = report.served,
            skipped = report.skipped,
            keys = report.distinct_keys,
            refills = report.refills,
            "Batch run finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::AllocatorConfig;
    use crate::allocator::tests::{ScriptedProvider, TWO_SUM_REPLY, allocator_with};
    use crate::ai::ProviderChainBuilder;
    use crate::storage::{SharedPoolStore, SqlitePoolStore};
    use crate::types::Difficulty;
    use serde_json::json;
    use std::time::Duration;

    fn key(topic: &str, difficulty: Difficulty) -> AllocationKey {
        AllocationKey::new(topic, difficulty).unwrap()
    }

    #[tokio::test]
    async fn test_same_key_is_acquired_once_per_run() {
        let provider = Arc::new(ScriptedProvider::new(&[TWO_SUM_REPLY]));
        let store: SharedPoolStore = Arc::new(SqlitePoolStore::in_memory().unwrap());
        let allocator = allocator_with(provider.clone(), store.clone());

        let arrays = key("Arrays", Difficulty::Medium);
        let units = vec![
            WorkUnit::new("alice", arrays.clone()),
            WorkUnit::new("bob", arrays.clone()),
            WorkUnit::new("carol", arrays),
        ];

        let report = BatchRunner::new(&allocator).run(&units).await.unwrap();

        assert_eq!(report.served, 3);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.distinct_keys, 1);
        assert_eq!(report.refills, 1);
        assert_eq!(provider.calls(), 1);

        let ids: Vec<_> = report
            .results
            .iter()
            .map(|r| match &r.outcome {
                UnitOutcome::Served { problem_id, .. } => problem_id.clone(),
                UnitOutcome::Skipped { .. } => panic!("unit skipped"),
            })
            .collect();
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(store.stats().unwrap()[0].consumed, 1);
    }

    #[tokio::test]
    async fn test_unavailable_key_is_skipped_and_run_continues() {
        let provider = Arc::new(ScriptedProvider::new(&[]));
        let store: SharedPoolStore = Arc::new(SqlitePoolStore::in_memory().unwrap());
        let trees = key("Trees", Difficulty::Easy);
        store.insert_batch(&trees, &[json!({"title": "Invert Tree"})]).unwrap();

        let allocator = allocator_with(provider.clone(), store);
        let graphs = key("Graphs", Difficulty::Hard);
        let units = vec![
            WorkUnit::new("u1", graphs.clone()),
            WorkUnit::new("u2", trees),
            WorkUnit::new("u3", graphs),
        ];

        let report = BatchRunner::new(&allocator).run(&units).await.unwrap();

        assert_eq!(report.served, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.distinct_keys, 2);
        assert_eq!(report.refills, 0);
        // The failed key is not retried within the run
        assert_eq!(provider.calls(), 1);

        match &report.results[0].outcome {
            UnitOutcome::Skipped { reason } => assert!(reason.contains("Graphs/Hard")),
            other => panic!("expected skip, got {:?}", other),
        }
        assert!(matches!(
            report.results[1].outcome,
            UnitOutcome::Served { ref title, .. } if title.as_deref() == Some("Invert Tree")
        ));
    }

    #[tokio::test]
    async fn test_deadline_expiry_is_skipped() {
        struct Slow;

        #[async_trait::async_trait]
        impl crate::ai::GenerationProvider for Slow {
            async fn generate(&self, _: &str, _: bool) -> crate::ai::ProviderResult<String> {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(TWO_SUM_REPLY.to_string())
            }
            fn name(&self) -> &str {
                "slow"
            }
            fn model(&self) -> &str {
                "slow"
            }
            fn has_credentials(&self) -> bool {
                true
            }
        }

        let store: SharedPoolStore = Arc::new(SqlitePoolStore::in_memory().unwrap());
        let chain = ProviderChainBuilder::new().add_provider(Slow).build();
        let allocator = Allocator::new(
            chain,
            store,
            AllocatorConfig {
                acquire_timeout: Some(Duration::from_millis(20)),
                ..Default::default()
            },
        );

        let units = vec![WorkUnit::new("late", key("Heaps", Difficulty::Medium))];
        let report = BatchRunner::new(&allocator).run(&units).await.unwrap();

        assert_eq!(report.skipped, 1);
        match &report.results[0].outcome {
            UnitOutcome::Skipped { reason } => assert!(reason.contains("Timeout")),
            other => panic!("expected skip, got {:?}", other),
        }
    }

    #[test]
    fn test_report_serializes_outcome_inline() {
        let result = UnitResult {
            unit_id: "alice".into(),
            key: "Arrays/Medium".into(),
            outcome: UnitOutcome::Skipped {
                reason: "empty".into(),
            },
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["status"], "skipped");
        assert_eq!(value["reason"], "empty");
        assert_eq!(value["unit_id"], "alice");
    }
}
