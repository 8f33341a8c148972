//! problembank - Problem Pool Allocator
//!
//! Hands out a previously unused problem per (topic, difficulty) key,
//! refilling an empty sub-pool on demand from a chain of LLM providers and
//! marking every handed-out problem so it is never reused.
//!
//! ## Core Features
//!
//! - **At-most-once claims**: one conditional UPDATE per claim, safe under
//!   overlapping runs
//! - **Provider chain**: Gemini then Groq, exponential backoff on rate limits
//! - **Bounded refill**: one refill and one retry claim per acquire
//! - **Batch runs**: per-key memoization, unavailable keys skipped
//!
//! ## Quick Start
//!
//! ```ignore
//! use problembank::{Allocator, AllocationKey, Difficulty, ProviderChain, SqlitePoolStore};
//!
//! let store = Arc::new(SqlitePoolStore::in_memory()?);
//! let chain = ProviderChain::from_configs(&config.resolved_providers(), config.chain_config())?;
//! let allocator = Allocator::new(chain, store, config.allocator_config());
//!
//! let key = AllocationKey::new("Arrays", Difficulty::Medium)?;
//! let problem = allocator.acquire(&key).await?;
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: generation providers, fallback chain, response decoding
//! - [`allocator`]: claim/refill state machine and batch runs
//! - [`storage`]: SQLite pool store with connection pooling
//! - [`config`]: layered configuration

pub mod ai;
pub mod allocator;
pub mod cli;
pub mod config;
pub mod constants;
pub mod storage;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader};

// Error Types
pub use types::error::{FailureKind, PoolError, ProviderFailure, Result, ResultExt};

// Domain
pub use types::{AllocationKey, Difficulty, ProblemRecord};

// Storage
pub use storage::{Database, PoolConfig, PoolStore, SharedPoolStore, SqlitePoolStore};

// Allocation
pub use allocator::{Acquisition, Allocator, AllocatorConfig, BatchReport, BatchRunner, WorkUnit};

// =============================================================================
// AI Re-exports
// =============================================================================

pub use ai::{
    GenerationProvider, ProviderChain, ProviderChainBuilder, ProviderConfig, ProviderKind,
    with_timeout,
};
