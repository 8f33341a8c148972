//! CLI Common Utilities
//!
//! Shared initialization and context management for CLI commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::ai::ProviderChain;
use crate::allocator::Allocator;
use crate::config::{Config, ConfigLoader, PROJECT_DIR};
use crate::storage::{Database, SharedPoolStore, SqlitePoolStore};
use crate::types::{PoolError, Result};

/// Command execution context
///
/// Created via `CommandContext::load()` for commands that touch the pool.
#[derive(Clone)]
pub struct CommandContext {
    /// Project directory (.problembank)
    pub project_dir: PathBuf,
    /// Loaded configuration
    pub config: Config,
    /// Pool store over the configured database
    pub store: SharedPoolStore,
}

impl CommandContext {
    /// Validates initialization, loads config, and opens the pool database.
    pub fn load() -> Result<Self> {
        let project_dir = require_initialized()?;
        let config = ConfigLoader::load()?;
        let store = open_store(&config)?;

        Ok(Self {
            project_dir,
            config,
            store,
        })
    }

    /// Allocator wired to the configured provider chain
    pub fn allocator(&self) -> Result<Allocator> {
        build_allocator(&self.config, Arc::clone(&self.store))
    }
}

/// Require the project directory to exist
///
/// Returns `PoolError::NotInitialized` if `init` has not been run.
pub fn require_initialized() -> Result<PathBuf> {
    let project_dir = Path::new(PROJECT_DIR);

    if !project_dir.exists() {
        return Err(PoolError::NotInitialized);
    }

    Ok(project_dir.to_path_buf())
}

/// Check if the project is initialized
pub fn is_initialized() -> bool {
    Path::new(PROJECT_DIR).exists()
}

/// Open the configured database; it must already exist
pub fn open_store(config: &Config) -> Result<SharedPoolStore> {
    let path = &config.store.path;
    if !path.exists() {
        return Err(PoolError::NotInitialized);
    }

    let db = Database::open_with_config(path, config.store.pool_config())?;
    // Applies pending migrations on databases created by older versions
    db.initialize()?;
    Ok(Arc::new(SqlitePoolStore::new(Arc::new(db))))
}

/// Create and initialize the configured database
pub fn create_store(config: &Config) -> Result<Database> {
    let db = Database::open_with_config(&config.store.path, config.store.pool_config())?;
    db.initialize()?;
    Ok(db)
}

/// Build an allocator from configuration
pub fn build_allocator(config: &Config, store: SharedPoolStore) -> Result<Allocator> {
    let chain = ProviderChain::from_configs(&config.resolved_providers(), config.chain_config())?;

    let eligible = chain.eligible_providers();
    if eligible.is_empty() {
        tracing::warn!(
            "No provider has an API key; empty sub-pools cannot be refilled (set GEMINI_API_KEY or GROQ_API_KEY)"
        );
    } else {
        debug!(providers = ?eligible, "Provider chain ready");
    }

    Ok(Allocator::new(chain, store, config.allocator_config()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AllocationKey, Difficulty};
    use tempfile::TempDir;

    fn config_at(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.store.path = dir.path().join("pool.db");
        config.store.pool_size = Some(2);
        config
    }

    #[test]
    fn test_open_store_requires_database() {
        let dir = TempDir::new().unwrap();
        let config = config_at(&dir);
        assert!(matches!(
            open_store(&config),
            Err(PoolError::NotInitialized)
        ));
    }

    #[test]
    fn test_create_then_open_store() {
        let dir = TempDir::new().unwrap();
        let config = config_at(&dir);
        create_store(&config).unwrap();

        let store = open_store(&config).unwrap();
        let key = AllocationKey::new("Arrays", Difficulty::Easy).unwrap();
        store
            .insert_batch(&key, &[serde_json::json!({"title": "Two Sum"})])
            .unwrap();
        assert_eq!(store.stats().unwrap()[0].unused, 1);
    }

    #[test]
    fn test_build_allocator_uses_config() {
        let dir = TempDir::new().unwrap();
        let mut config = config_at(&dir);
        config.allocator.batch_size = 9;
        create_store(&config).unwrap();

        let allocator = build_allocator(&config, open_store(&config).unwrap()).unwrap();
        assert_eq!(allocator.config().batch_size, 9);
    }
}
