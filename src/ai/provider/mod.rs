//! Generation Provider Abstraction
//!
//! Defines the `GenerationProvider` trait: one upstream text-generation
//! service behind a uniform `generate(prompt, want_structured)` call.
//! Every variant owns its endpoint, credential check, request envelope and
//! status classification, and reports failures as [`ProviderFailure`].
//!
//! ## Modules
//!
//! - `chain`: ordered fallback across providers with rate-limit backoff
//! - `gemini`: primary provider (Gemini `generateContent`)
//! - `groq`: secondary provider (OpenAI-compatible chat completions)

mod chain;
mod gemini;
mod groq;

pub use chain::{ChainAttemptResult, ChainConfig, ChainStats, ProviderChain, ProviderChainBuilder};
pub use gemini::GeminiProvider;
pub use groq::GroqProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::constants::provider as provider_constants;
use crate::types::{PoolError, ProviderFailure, Result};

/// Outcome of a single provider attempt
pub type ProviderResult<T> = std::result::Result<T, ProviderFailure>;

/// Shared provider handle for the chain and the allocator
pub type SharedProvider = Arc<dyn GenerationProvider>;

// =============================================================================
// Provider Trait
// =============================================================================

/// One upstream generation service
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Generate text for `prompt`.
    ///
    /// With `want_structured`, the upstream's JSON response mode is requested
    /// when it has one. Returns `AuthMissing` without any I/O when no
    /// credential is configured.
    async fn generate(&self, prompt: &str, want_structured: bool) -> ProviderResult<String>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model name currently in use
    fn model(&self) -> &str;

    /// Whether a credential is configured; the chain skips providers without one
    fn has_credentials(&self) -> bool;
}

// =============================================================================
// Provider Configuration
// =============================================================================

/// Supported upstream services
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Gemini,
    Groq,
}

impl ProviderKind {
    /// Environment variable consulted when no key is set in config
    pub fn key_env(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => provider_constants::GEMINI_KEY_ENV,
            ProviderKind::Groq => provider_constants::GROQ_KEY_ENV,
        }
    }

    pub fn default_temperature(&self) -> f32 {
        match self {
            ProviderKind::Gemini => 0.7,
            ProviderKind::Groq => 0.5,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Gemini => write!(f, "gemini"),
            ProviderKind::Groq => write!(f, "groq"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(ProviderKind::Gemini),
            "groq" => Ok(ProviderKind::Groq),
            _ => Err(format!(
                "Unknown provider: {}. Supported: gemini, groq",
                s
            )),
        }
    }
}

/// Configuration for one provider in the chain
///
/// API keys are never serialized to output and are redacted in debug output.
/// Providers convert the key to `SecretString` internally.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Upstream service
    pub kind: ProviderKind,
    /// Model name (provider-specific)
    pub model: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Sampling temperature; provider default when unset
    pub temperature: Option<f32>,
    /// API key; falls back to the provider's environment variable on resolve
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// API base URL (for custom endpoints and tests)
    pub api_base: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::for_kind(ProviderKind::default())
    }
}

impl ProviderConfig {
    pub fn for_kind(kind: ProviderKind) -> Self {
        Self {
            kind,
            model: None,
            timeout_secs: provider_constants::DEFAULT_TIMEOUT_SECS,
            temperature: None,
            api_key: None,
            api_base: None,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = Some(base.into());
        self
    }

    /// Fill the API key from the environment when config leaves it unset.
    ///
    /// Called once while loading configuration; providers never read the
    /// environment themselves.
    pub fn resolve_credentials(mut self) -> Self {
        let configured = self.api_key.take().filter(|k| !k.trim().is_empty());
        self.api_key = configured.or_else(|| {
            std::env::var(self.kind.key_env())
                .ok()
                .filter(|k| !k.trim().is_empty())
        });
        self
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
            .unwrap_or_else(|| self.kind.default_temperature())
    }
}

/// Create a shared provider from configuration
pub fn create_provider(config: &ProviderConfig) -> Result<SharedProvider> {
    match config.kind {
        ProviderKind::Gemini => Ok(Arc::new(GeminiProvider::new(config.clone())?)),
        ProviderKind::Groq => Ok(Arc::new(GroqProvider::new(config.clone())?)),
    }
}

// =============================================================================
// Shared Helpers
// =============================================================================

fn build_http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| PoolError::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Validate an endpoint URL: http/https only, no trailing slash
fn validate_endpoint(endpoint: &str, provider: &str) -> Result<String> {
    let url = url::Url::parse(endpoint).map_err(|e| {
        PoolError::Config(format!(
            "Invalid {} endpoint URL '{}': {}",
            provider, endpoint, e
        ))
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(PoolError::Config(format!(
            "{} endpoint must use http or https scheme, got: {}",
            provider,
            url.scheme()
        )));
    }

    if url.scheme() == "http"
        && let Some(host) = url.host_str()
        && !matches!(host, "localhost" | "127.0.0.1" | "::1")
    {
        warn!(
            "{} endpoint uses plain http on a non-local host: {}",
            provider, host
        );
    }

    let mut result = url.to_string();
    if result.ends_with('/') {
        result.pop();
    }
    Ok(result)
}

/// Leading characters of an upstream error body
fn body_preview(body: &str) -> String {
    body.chars()
        .take(provider_constants::ERROR_BODY_PREVIEW)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!("Gemini".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
        assert_eq!("groq".parse::<ProviderKind>().unwrap(), ProviderKind::Groq);
        assert!("openai".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = ProviderConfig::for_kind(ProviderKind::Groq).with_api_key("gsk_secret");
        let debug = format!("{:?}", config);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("gsk_secret"));
    }

    #[test]
    fn test_api_key_not_serialized() {
        let config = ProviderConfig::for_kind(ProviderKind::Gemini).with_api_key("secret");
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }

    #[test]
    fn test_configured_key_wins_over_blank() {
        let config = ProviderConfig::for_kind(ProviderKind::Gemini)
            .with_api_key("from-config")
            .resolve_credentials();
        assert_eq!(config.api_key.as_deref(), Some("from-config"));
    }

    #[test]
    fn test_default_temperatures() {
        assert_eq!(ProviderConfig::for_kind(ProviderKind::Gemini).temperature(), 0.7);
        assert_eq!(ProviderConfig::for_kind(ProviderKind::Groq).temperature(), 0.5);
    }

    #[test]
    fn test_validate_endpoint() {
        assert_eq!(
            validate_endpoint("https://api.groq.com/openai/v1/", "groq").unwrap(),
            "https://api.groq.com/openai/v1"
        );
        assert!(validate_endpoint("ftp://example.com", "groq").is_err());
        assert!(validate_endpoint("not a url", "gemini").is_err());
    }

    #[test]
    fn test_body_preview_is_bounded() {
        let body = "e".repeat(1000);
        assert_eq!(
            body_preview(&body).len(),
            provider_constants::ERROR_BODY_PREVIEW
        );
    }
}
