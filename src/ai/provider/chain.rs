//! Fallback Provider Chain
//!
//! Ordered provider attempts with rate-limit backoff.
//!
//! ## Strategy
//!
//! 1. Keep only providers with credentials configured (no I/O for the rest)
//! 2. Try each eligible provider in order; first success wins
//! 3. On `RateLimited`, retry the same provider with exponential backoff
//!    (1s, 2s, 4s, ...) up to the attempt ceiling
//! 4. On any other failure, move to the next provider immediately
//! 5. All providers failed (or none eligible): `ChainExhausted`

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use backon::{ExponentialBuilder, Retryable};
use tracing::{debug, info, instrument, warn};

use crate::constants::chain as chain_constants;

use super::{GenerationProvider, ProviderConfig, SharedProvider};
use crate::types::{FailureKind, PoolError, ProviderFailure, Result};

/// Configuration for the provider chain
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Attempts per provider while it keeps rate limiting (including the first)
    pub max_attempts: usize,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Backoff multiplier
    pub backoff_factor: f32,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            max_attempts: chain_constants::MAX_ATTEMPTS,
            initial_delay: Duration::from_millis(chain_constants::INITIAL_DELAY_MS),
            max_delay: Duration::from_secs(chain_constants::MAX_DELAY_SECS),
            backoff_factor: chain_constants::BACKOFF_FACTOR,
        }
    }
}

impl ChainConfig {
    /// Backoff schedule between same-provider attempts
    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.initial_delay)
            .with_max_delay(self.max_delay)
            .with_factor(self.backoff_factor)
            .with_max_times(self.max_attempts.saturating_sub(1))
    }
}

/// One provider attempt as seen by the chain
#[derive(Debug, Clone)]
pub struct ChainAttemptResult {
    pub provider_name: String,
    pub attempt_number: usize,
    /// `None` when the attempt succeeded
    pub failure: Option<ProviderFailure>,
    /// Backoff slept after this attempt, if it was retried
    pub wait_after: Option<Duration>,
}

/// Execution statistics for the chain
#[derive(Debug, Default)]
pub struct ChainStats {
    pub total_attempts: usize,
    pub successful_provider: Option<String>,
    pub attempts: Vec<ChainAttemptResult>,
    pub total_duration_ms: u64,
    pub providers_skipped_no_credentials: usize,
}

impl ChainStats {
    /// Backoff delays in the order they were slept
    pub fn backoff_waits(&self) -> Vec<Duration> {
        self.attempts.iter().filter_map(|a| a.wait_after).collect()
    }

    /// Attempts made against one provider
    pub fn attempts_for(&self, provider_name: &str) -> usize {
        self.attempts
            .iter()
            .filter(|a| a.provider_name == provider_name)
            .count()
    }
}

/// Ordered fallback chain of generation providers
#[derive(Clone)]
pub struct ProviderChain {
    providers: Vec<SharedProvider>,
    config: ChainConfig,
}

impl ProviderChain {
    /// Create an empty chain
    pub fn new(config: ChainConfig) -> Self {
        Self {
            providers: Vec::new(),
            config,
        }
    }

    /// Build chain from provider configs, preserving their order
    pub fn from_configs(configs: &[ProviderConfig], chain_config: ChainConfig) -> Result<Self> {
        let mut chain = Self::new(chain_config);
        for config in configs {
            chain.providers.push(super::create_provider(config)?);
        }
        Ok(chain)
    }

    /// Names of providers that will actually be tried
    pub fn eligible_providers(&self) -> Vec<&str> {
        self.providers
            .iter()
            .filter(|p| p.has_credentials())
            .map(|p| p.name())
            .collect()
    }

    /// Generate text through the chain, discarding statistics
    pub async fn generate(&self, prompt: &str, want_structured: bool) -> Result<String> {
        let (text, _stats) = self.execute(prompt, want_structured).await?;
        Ok(text)
    }

    /// Run the fallback chain
    #[instrument(skip(self, prompt), fields(providers = self.providers.len()))]
    pub async fn execute(
        &self,
        prompt: &str,
        want_structured: bool,
    ) -> Result<(String, ChainStats)> {
        let mut stats = ChainStats::default();
        let start_time = Instant::now();
        let mut last_failure: Option<ProviderFailure> = None;

        for provider in &self.providers {
            let provider_name = provider.name().to_string();

            if !provider.has_credentials() {
                debug!(provider = %provider_name, "Skipping provider (no credentials)");
                stats.providers_skipped_no_credentials += 1;
                continue;
            }

            let outcome = self
                .attempt_with_backoff(provider.as_ref(), prompt, want_structured, &mut stats)
                .await;

            match outcome {
                Ok(text) => {
                    stats.successful_provider = Some(provider_name);
                    stats.total_duration_ms = start_time.elapsed().as_millis() as u64;

                    info!(
                        provider = %stats.successful_provider.as_deref().unwrap_or("unknown"),
                        attempts = stats.total_attempts,
                        "Chain succeeded"
                    );
                    return Ok((text, stats));
                }
                Err(failure) => {
                    if failure.kind == FailureKind::RateLimited {
                        info!(
                            provider = %provider_name,
                            attempts = stats.attempts_for(&provider_name),
                            "Rate limit persisted, trying next provider"
                        );
                    } else {
                        info!(
                            provider = %provider_name,
                            kind = %failure.kind,
                            "Provider failed, trying next"
                        );
                    }
                    last_failure = Some(failure);
                }
            }
        }

        stats.total_duration_ms = start_time.elapsed().as_millis() as u64;

        if stats.total_attempts == 0 {
            warn!(
                skipped = stats.providers_skipped_no_credentials,
                "No provider has credentials configured"
            );
        }

        Err(PoolError::ChainExhausted {
            attempts: stats.total_attempts,
            last_failure: last_failure.map(|f| f.to_string()),
        })
    }

    /// Call one provider, retrying only while it answers `RateLimited`
    async fn attempt_with_backoff(
        &self,
        provider: &dyn GenerationProvider,
        prompt: &str,
        want_structured: bool,
        stats: &mut ChainStats,
    ) -> std::result::Result<String, ProviderFailure> {
        let calls = AtomicUsize::new(0);
        let calls_ref = &calls;
        let mut retried: Vec<(ProviderFailure, Duration)> = Vec::new();

        let outcome = (move || {
            let attempt = calls_ref.fetch_add(1, Ordering::SeqCst) + 1;
            debug!(provider = provider.name(), attempt, "Chain attempt");
            provider.generate(prompt, want_structured)
        })
        .retry(self.config.backoff())
        .when(ProviderFailure::is_retryable)
        .notify(|failure: &ProviderFailure, wait: Duration| {
            warn!(
                provider = provider.name(),
                error = %failure,
                wait_ms = wait.as_millis() as u64,
                "Rate limited, backing off"
            );
            retried.push((failure.clone(), wait));
        })
        .await;

        let provider_name = provider.name().to_string();
        let mut attempt_number = 0;
        for (failure, wait) in retried {
            attempt_number += 1;
            stats.attempts.push(ChainAttemptResult {
                provider_name: provider_name.clone(),
                attempt_number,
                failure: Some(failure),
                wait_after: Some(wait),
            });
        }

        if let Err(failure) = &outcome {
            warn!(provider = %provider_name, error = %failure, "Provider failed");
        }

        stats.attempts.push(ChainAttemptResult {
            provider_name,
            attempt_number: attempt_number + 1,
            failure: outcome.as_ref().err().cloned(),
            wait_after: None,
        });
        stats.total_attempts += calls.load(Ordering::SeqCst);

        outcome
    }
}

/// Builder for creating provider chains
pub struct ProviderChainBuilder {
    providers: Vec<SharedProvider>,
    config: ChainConfig,
}

impl ProviderChainBuilder {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            config: ChainConfig::default(),
        }
    }

    /// Add a provider at the end of the order
    pub fn add_provider(mut self, provider: impl GenerationProvider + 'static) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    /// Add a shared provider at the end of the order
    pub fn add_shared(mut self, provider: SharedProvider) -> Self {
        self.providers.push(provider);
        self
    }

    /// Set chain configuration
    pub fn with_config(mut self, config: ChainConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the chain
    pub fn build(self) -> ProviderChain {
        ProviderChain {
            providers: self.providers,
            config: self.config,
        }
    }
}

impl Default for ProviderChainBuilder {
    fn default() -> Self {
        Self::new()
    }
}
