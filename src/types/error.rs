//! Unified Error Type System
//!
//! Centralized error types for the entire application.
//!
//! ## Layers
//!
//! - **ProviderFailure**: one failed attempt against one upstream service.
//!   Recovered inside the provider chain, never surfaced past it.
//! - **ParseFailure**: generation succeeded but the text held no usable records.
//! - **PoolError**: crate-wide error. `ChainExhausted` is what the chain
//!   reports; `PoolUnavailable` is the only failure `acquire` reports.

use std::time::Duration;
use thiserror::Error;

use crate::constants::payload as payload_constants;

// =============================================================================
// Provider Failure Kinds
// =============================================================================

/// Failure taxonomy shared by every generation provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Upstream throttled the request - retry the same provider after backoff
    RateLimited,
    /// Upstream answered with a non-success status - move to the next provider
    NotAvailable,
    /// Request never completed (connect, TLS, timeout)
    Transport,
    /// No credential configured; no request was sent
    AuthMissing,
    /// Upstream answered but the envelope held no usable text
    Malformed,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimited => write!(f, "RATE_LIMITED"),
            Self::NotAvailable => write!(f, "NOT_AVAILABLE"),
            Self::Transport => write!(f, "TRANSPORT"),
            Self::AuthMissing => write!(f, "AUTH_MISSING"),
            Self::Malformed => write!(f, "MALFORMED"),
        }
    }
}

impl FailureKind {
    /// Only rate limits are retried on the same provider
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}

// =============================================================================
// Provider Failure
// =============================================================================

/// One failed provider attempt with its classification
#[derive(Debug, Clone)]
pub struct ProviderFailure {
    /// Failure kind for chain routing
    pub kind: FailureKind,
    /// Detailed error message
    pub message: String,
    /// Provider that produced the failure
    pub provider: Option<String>,
    /// HTTP status, when the upstream answered
    pub status: Option<u16>,
}

impl std::fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(provider) = &self.provider {
            write!(f, "[{}:{}] {}", provider, self.kind, self.message)
        } else {
            write!(f, "[{}] {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for ProviderFailure {}

impl ProviderFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            provider: None,
            status: None,
        }
    }

    pub fn with_provider(
        kind: FailureKind,
        message: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            provider: Some(provider.into()),
            status: None,
        }
    }

    /// Credential absent; raised before any network I/O
    pub fn auth_missing(provider: impl Into<String>) -> Self {
        Self::with_provider(
            FailureKind::AuthMissing,
            "No API key configured",
            provider,
        )
    }

    /// Envelope decoded but carried no text
    pub fn malformed(message: impl Into<String>, provider: impl Into<String>) -> Self {
        Self::with_provider(FailureKind::Malformed, message, provider)
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

// =============================================================================
// Failure Classifier
// =============================================================================

/// Maps upstream responses and transport errors onto [`FailureKind`]
pub struct FailureClassifier;

impl FailureClassifier {
    /// Classify a non-success HTTP status
    pub fn classify_http_status(status: u16, message: &str, provider: &str) -> ProviderFailure {
        let kind = match status {
            429 => FailureKind::RateLimited,
            _ => FailureKind::NotAvailable,
        };
        ProviderFailure::with_provider(kind, message, provider).status(status)
    }

    /// Classify a request that failed before a usable response arrived
    pub fn classify_transport(err: &reqwest::Error, provider: &str) -> ProviderFailure {
        if err.is_decode() {
            return ProviderFailure::malformed(
                format!("Failed to decode response: {}", err),
                provider,
            );
        }
        if let Some(status) = err.status() {
            return Self::classify_http_status(status.as_u16(), &err.to_string(), provider);
        }
        ProviderFailure::with_provider(
            FailureKind::Transport,
            format!("Request failed: {}", err),
            provider,
        )
    }
}

// =============================================================================
// Parse Failure
// =============================================================================

/// Generated text that could not be turned into problem records
#[derive(Debug, Clone)]
pub struct ParseFailure {
    /// Why decoding failed
    pub reason: String,
    /// The offending text, kept whole for diagnostics
    pub text: String,
}

impl ParseFailure {
    pub fn new(reason: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            text: text.into(),
        }
    }

    /// Leading characters of the offending text
    pub fn preview(&self) -> String {
        self.text
            .chars()
            .take(payload_constants::PREVIEW_CHARS)
            .collect()
    }
}

impl std::fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}. Content preview: {}", self.reason, self.preview())
    }
}

impl std::error::Error for ParseFailure {}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum PoolError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // -------------------------------------------------------------------------
    // Generation Errors
    // -------------------------------------------------------------------------
    /// Every eligible provider failed, or none was eligible
    #[error("Provider chain exhausted after {attempts} attempts{}", last_failure_suffix(.last_failure))]
    ChainExhausted {
        attempts: usize,
        last_failure: Option<String>,
    },

    // -------------------------------------------------------------------------
    // Allocation Errors
    // -------------------------------------------------------------------------
    /// No item is obtainable for this key right now
    #[error("No problem available for {key}: {reason}")]
    PoolUnavailable { key: String, reason: String },

    #[error("Invalid allocation key: {0}")]
    InvalidKey(String),

    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    // -------------------------------------------------------------------------
    // Setup Errors
    // -------------------------------------------------------------------------
    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not initialized: run 'problembank init' first")]
    NotInitialized,
}

fn last_failure_suffix(last: &Option<String>) -> String {
    last.as_ref()
        .map(|msg| format!(" (last: {})", msg))
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, PoolError>;

impl PoolError {
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    pub fn unavailable(key: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        Self::PoolUnavailable {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Failures a batch run skips over instead of aborting
    pub fn is_skippable(&self) -> bool {
        matches!(self, Self::PoolUnavailable { .. } | Self::Timeout { .. })
    }
}

/// Context extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn with_context<C: Into<String>>(self, context: C) -> Result<T>;

    /// Add context using a closure (lazy evaluation)
    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<C: Into<String>>(self, context: C) -> Result<T> {
        self.map_err(|e| PoolError::Storage(format!("{}: {}", context.into(), e)))
    }

    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|e| PoolError::Storage(format!("{}: {}", f().into(), e)))
    }
}

// =============================================================================
// Tests
// =============================================================================
