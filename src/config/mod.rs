//! Configuration Management
//!
//! Hierarchical resolution:
//! 1. Built-in defaults
//! 2. Global config (platform config dir)
//! 3. Project config (.problembank/config.toml)
//! 4. Environment variables (PROBLEMBANK_*)
//! 5. CLI arguments (highest priority)

mod loader;
mod types;

pub use loader::{ConfigFormat, ConfigLoader};
pub use types::*;

/// Project data directory, relative to the working directory
pub const PROJECT_DIR: &str = ".problembank";

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "PROBLEMBANK_";
