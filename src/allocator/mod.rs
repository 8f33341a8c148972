//! Problem Pool Allocator
//!
//! Hands out one unused problem per (topic, difficulty) key, refilling an
//! empty sub-pool from the provider chain.
//!
//! ## State machine
//!
//! ```text
//! CLAIM ──hit──────────────────────────────────────────▶ DONE
//!   │ empty
//!   ▼
//! REFILL ──chain exhausted──────────────────────────────▶ FAILED
//!   │ text
//!   ▼
//! PARSE ──parse failure / no items / insert error───────▶ FAILED
//!   │ inserted
//!   ▼
//! CLAIM_RETRY ──hit──▶ DONE      empty ──────────────────▶ FAILED
//! ```
//!
//! Exactly one refill and one retry claim per `acquire`; there is no path
//! back from CLAIM_RETRY to REFILL. FAILED surfaces as
//! [`PoolError::PoolUnavailable`], which callers skip.

pub mod batch;

pub use batch::{BatchReport, BatchRunner, UnitOutcome, UnitResult, WorkUnit};

use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};

use crate::ai::{ProviderChain, extract_problems, refill_prompt, with_optional_timeout};
use crate::constants::allocator as allocator_constants;
use crate::storage::SharedPoolStore;
use crate::types::{AllocationKey, GenerationRequest, PoolError, ProblemRecord, Result};

/// Allocator tuning
#[derive(Debug, Clone)]
pub struct AllocatorConfig {
    /// Problems requested per refill, independent of pending consumers
    pub batch_size: usize,
    /// Pause between a successful insert and the retry claim
    pub settle_delay: Duration,
    /// Caller-side deadline around one whole acquire
    pub acquire_timeout: Option<Duration>,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            batch_size: allocator_constants::REFILL_BATCH_SIZE,
            settle_delay: Duration::from_millis(allocator_constants::SETTLE_DELAY_MS),
            acquire_timeout: None,
        }
    }
}

/// A successful acquire
#[derive(Debug, Clone)]
pub struct Acquisition {
    pub record: ProblemRecord,
    /// Whether this acquire had to refill the sub-pool first
    pub refilled: bool,
}

enum AcquireState {
    Claim,
    Refill,
    Parse(String),
    ClaimRetry,
    Done(ProblemRecord),
    Failed(String),
}

/// Top-level orchestrator over the store and the provider chain
///
/// Holds no per-key state; everything durable lives in the store.
pub struct Allocator {
    chain: ProviderChain,
    store: SharedPoolStore,
    config: AllocatorConfig,
}

impl Allocator {
    pub fn new(chain: ProviderChain, store: SharedPoolStore, config: AllocatorConfig) -> Self {
        Self {
            chain,
            store,
            config,
        }
    }

    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// Claim one unused problem for `key`, refilling once if the sub-pool is empty
    pub async fn acquire(&self, key: &AllocationKey) -> Result<ProblemRecord> {
        self.acquire_detailed(key).await.map(|a| a.record)
    }

    /// [`Allocator::acquire_detailed`] bounded by the configured deadline
    pub async fn acquire_with_deadline(&self, key: &AllocationKey) -> Result<Acquisition> {
        with_optional_timeout(
            self.config.acquire_timeout,
            self.acquire_detailed(key),
            &format!("acquire {}", key),
        )
        .await
    }

    /// Run the claim/refill state machine for one key
    #[instrument(skip(self, key), fields(key = %key))]
    pub async fn acquire_detailed(&self, key: &AllocationKey) -> Result<Acquisition> {
        let mut state = AcquireState::Claim;
        let mut refilled = false;

        loop {
            state = match state {
                AcquireState::Claim => match self.store.claim_unused(key) {
                    Ok(Some(record)) => AcquireState::Done(record),
                    Ok(None) => {
                        info!("Sub-pool empty, refilling");
                        AcquireState::Refill
                    }
                    Err(e) => self.store_failure("claim", e),
                },

                AcquireState::Refill => {
                    let request = GenerationRequest::refill(key.clone(), self.config.batch_size);
                    let prompt = refill_prompt(&request);
                    match self.chain.generate(&prompt, request.want_structured).await {
                        Ok(text) => AcquireState::Parse(text),
                        Err(e) => AcquireState::Failed(format!("refill failed: {}", e)),
                    }
                }

                AcquireState::Parse(text) => match extract_problems(&text) {
                    Ok(items) if items.is_empty() => {
                        AcquireState::Failed("provider returned no problems".to_string())
                    }
                    Ok(items) => match self.store.insert_batch(key, &items) {
                        Ok(inserted) => {
                            refilled = true;
                            debug!(generated = items.len(), inserted, "Refill stored");
                            AcquireState::ClaimRetry
                        }
                        Err(e) => self.store_failure("insert", e),
                    },
                    Err(failure) => {
                        AcquireState::Failed(format!("unusable provider output: {}", failure))
                    }
                },

                AcquireState::ClaimRetry => {
                    if !self.config.settle_delay.is_zero() {
                        tokio::time::sleep(self.config.settle_delay).await;
                    }
                    match self.store.claim_unused(key) {
                        Ok(Some(record)) => AcquireState::Done(record),
                        Ok(None) => {
                            AcquireState::Failed("sub-pool still empty after refill".to_string())
                        }
                        Err(e) => self.store_failure("retry claim", e),
                    }
                }

                AcquireState::Done(record) => {
                    info!(id = %record.id, refilled, "Problem acquired");
                    return Ok(Acquisition { record, refilled });
                }

                AcquireState::Failed(reason) => {
                    warn!(reason = %reason, "Problem unavailable");
                    return Err(PoolError::unavailable(key, reason));
                }
            };
        }
    }

    fn store_failure(&self, operation: &str, err: PoolError) -> AcquireState {
        error!(operation, error = %err, "Pool store failure");
        AcquireState::Failed(format!("store {} failed: {}", operation, err))
    }
}
