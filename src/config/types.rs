//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (platform config dir) and project (.problembank/) level configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::ai::{ChainConfig, ProviderConfig, ProviderKind};
use crate::allocator::AllocatorConfig;
use crate::constants::{allocator, chain, storage};
use crate::storage::PoolConfig;
use crate::types::{AllocationKey, PoolError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Pool database settings
    pub store: StoreConfig,

    /// Allocator tuning
    pub allocator: AllocatorSettings,

    /// Provider chain retry schedule
    pub chain: ChainSettings,

    /// Providers in fallback order
    pub providers: Vec<ProviderConfig>,

    /// Default work for `run`
    pub batch: BatchSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            store: StoreConfig::default(),
            allocator: AllocatorSettings::default(),
            chain: ChainSettings::default(),
            providers: vec![
                ProviderConfig::for_kind(ProviderKind::Gemini),
                ProviderConfig::for_kind(ProviderKind::Groq),
            ],
            batch: BatchSettings::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `PoolError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if self.allocator.batch_size == 0 {
            return Err(PoolError::Config(
                "allocator.batch_size must be greater than 0".to_string(),
            ));
        }

        if self.allocator.acquire_timeout_secs == Some(0) {
            return Err(PoolError::Config(
                "allocator.acquire_timeout_secs must be greater than 0 when set".to_string(),
            ));
        }

        if self.chain.max_attempts == 0 {
            return Err(PoolError::Config(
                "chain.max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.chain.backoff_factor < 1.0 {
            return Err(PoolError::Config(format!(
                "chain.backoff_factor must be at least 1.0, got {}",
                self.chain.backoff_factor
            )));
        }

        if self.store.busy_timeout_ms == 0 {
            return Err(PoolError::Config(
                "store.busy_timeout_ms must be greater than 0".to_string(),
            ));
        }

        for provider in &self.providers {
            let temperature = provider.temperature();
            if !(0.0..=2.0).contains(&temperature) {
                return Err(PoolError::Config(format!(
                    "{} temperature must be between 0.0 and 2.0, got {}",
                    provider.kind, temperature
                )));
            }
            if provider.timeout_secs == 0 {
                return Err(PoolError::Config(format!(
                    "{} timeout_secs must be greater than 0",
                    provider.kind
                )));
            }
        }

        self.batch.parsed_keys()?;

        Ok(())
    }

    pub fn allocator_config(&self) -> AllocatorConfig {
        AllocatorConfig {
            batch_size: self.allocator.batch_size,
            settle_delay: Duration::from_millis(self.allocator.settle_delay_ms),
            acquire_timeout: self.allocator.acquire_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn chain_config(&self) -> ChainConfig {
        ChainConfig {
            max_attempts: self.chain.max_attempts,
            initial_delay: Duration::from_millis(self.chain.initial_delay_ms),
            max_delay: Duration::from_secs(self.chain.max_delay_secs),
            backoff_factor: self.chain.backoff_factor,
        }
    }

    /// Providers with API keys filled from the environment where config leaves them unset
    pub fn resolved_providers(&self) -> Vec<ProviderConfig> {
        self.providers
            .iter()
            .cloned()
            .map(ProviderConfig::resolve_credentials)
            .collect()
    }
}

// =============================================================================
// Store
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database file
    pub path: PathBuf,

    /// Connection pool size (CPU-based when unset)
    pub pool_size: Option<u32>,

    /// SQLite busy timeout in milliseconds
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(super::PROJECT_DIR).join(storage::DEFAULT_DB_FILE),
            pool_size: None,
            busy_timeout_ms: storage::BUSY_TIMEOUT_MS,
        }
    }
}

impl StoreConfig {
    pub fn pool_config(&self) -> PoolConfig {
        let mut config = match self.pool_size {
            Some(size) => PoolConfig::with_max_size(size),
            None => PoolConfig::auto(),
        };
        config.busy_timeout_ms = self.busy_timeout_ms;
        config
    }
}

// =============================================================================
// Allocator
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocatorSettings {
    /// Problems requested per refill
    pub batch_size: usize,

    /// Pause before the post-refill claim (milliseconds)
    pub settle_delay_ms: u64,

    /// Deadline around one whole acquire (seconds); unbounded when unset
    pub acquire_timeout_secs: Option<u64>,
}

impl Default for AllocatorSettings {
    fn default() -> Self {
        Self {
            batch_size: allocator::REFILL_BATCH_SIZE,
            settle_delay_ms: allocator::SETTLE_DELAY_MS,
            acquire_timeout_secs: None,
        }
    }
}

// =============================================================================
// Chain
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainSettings {
    /// Attempts per provider while it keeps rate limiting
    pub max_attempts: usize,

    /// First backoff delay (milliseconds)
    pub initial_delay_ms: u64,

    /// Backoff multiplier
    pub backoff_factor: f32,

    /// Backoff ceiling (seconds)
    pub max_delay_secs: u64,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            max_attempts: chain::MAX_ATTEMPTS,
            initial_delay_ms: chain::INITIAL_DELAY_MS,
            backoff_factor: chain::BACKOFF_FACTOR,
            max_delay_secs: chain::MAX_DELAY_SECS,
        }
    }
}

// =============================================================================
// Batch
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Keys served by `run` when none are given, as `topic:difficulty`
    pub keys: Vec<String>,
}

impl BatchSettings {
    pub fn parsed_keys(&self) -> Result<Vec<AllocationKey>> {
        self.keys
            .iter()
            .map(|raw| {
                raw.parse::<AllocationKey>()
                    .map_err(|e| PoolError::Config(format!("batch.keys: {}", e)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[0].kind, ProviderKind::Gemini);
        assert_eq!(config.store.path, PathBuf::from(".problembank/pool.db"));
    }

    #[test]
    fn test_rejects_zero_batch_size() {
        let mut config = Config::default();
        config.allocator.batch_size = 0;
        assert!(matches!(config.validate(), Err(PoolError::Config(_))));
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let mut config = Config::default();
        config.chain.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_out_of_range_temperature() {
        let mut config = Config::default();
        config.providers[1].temperature = Some(2.5);
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("groq temperature"));
    }

    #[test]
    fn test_rejects_unknown_difficulty_in_batch_keys() {
        let mut config = Config::default();
        config.batch.keys = vec!["Arrays:Medium".into(), "Graphs:Nightmare".into()];
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("batch.keys"));
    }

    #[test]
    fn test_runtime_configs() {
        let mut config = Config::default();
        config.allocator.acquire_timeout_secs = Some(90);
        config.chain.initial_delay_ms = 250;

        let allocator = config.allocator_config();
        assert_eq!(allocator.batch_size, 5);
        assert_eq!(allocator.acquire_timeout, Some(Duration::from_secs(90)));

        let chain = config.chain_config();
        assert_eq!(chain.initial_delay, Duration::from_millis(250));
        assert_eq!(chain.max_attempts, 5);
    }

    #[test]
    fn test_store_pool_config() {
        let store = StoreConfig {
            pool_size: Some(3),
            busy_timeout_ms: 1234,
            ..Default::default()
        };
        let pool = store.pool_config();
        assert_eq!(pool.max_size, 3);
        assert_eq!(pool.busy_timeout_ms, 1234);
    }
}
