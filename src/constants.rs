//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Allocator constants
pub mod allocator {
    /// Number of problems requested per refill
    pub const REFILL_BATCH_SIZE: usize = 5;

    /// Delay before the post-refill claim (milliseconds)
    ///
    /// SQLite is read-your-writes, so no settling is needed by default.
    pub const SETTLE_DELAY_MS: u64 = 0;
}

/// Provider chain constants
pub mod chain {
    /// Attempts per provider while it keeps answering with rate limits
    pub const MAX_ATTEMPTS: usize = 5;

    /// First backoff delay (milliseconds)
    pub const INITIAL_DELAY_MS: u64 = 1000;

    /// Maximum delay between retries (seconds)
    pub const MAX_DELAY_SECS: u64 = 16;

    /// Backoff multiplier
    pub const BACKOFF_FACTOR: f32 = 2.0;
}

/// Provider constants
pub mod provider {
    /// Per-request timeout for upstream generation calls
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Environment variable holding the Gemini API key
    pub const GEMINI_KEY_ENV: &str = "GEMINI_API_KEY";

    /// Environment variable holding the Groq API key
    pub const GROQ_KEY_ENV: &str = "GROQ_API_KEY";

    /// Characters of an upstream error body kept in failure messages
    pub const ERROR_BODY_PREVIEW: usize = 200;
}

/// Storage constants
pub mod storage {
    /// Default database location inside the project directory
    pub const DEFAULT_DB_FILE: &str = "pool.db";

    /// SQLite busy timeout (milliseconds)
    pub const BUSY_TIMEOUT_MS: u64 = 5000;

    /// Timeout for acquiring a pooled connection (seconds)
    pub const CONNECTION_TIMEOUT_SECS: u64 = 30;
}

/// Payload constants
pub mod payload {
    /// Field of an object-shaped response that holds the problem list
    pub const PROBLEMS_FIELD: &str = "problems";

    /// Fields every generated problem is asked to carry
    pub const REQUESTED_FIELDS: &[&str] = &[
        "title",
        "slug",
        "description",
        "constraints",
        "examples",
        "approach",
        "complexity",
        "code_snippet",
    ];

    /// Characters of unparseable text kept for diagnostics
    pub const PREVIEW_CHARS: usize = 200;
}
