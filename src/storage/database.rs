//! Database Layer with Connection Pooling and Safe Transactions
//!
//! SQLite database layer featuring:
//! - Connection pooling via r2d2 for concurrent access
//! - Panic-safe transactions with automatic rollback
//! - Version-tracked migrations
//! - WAL mode so overlapping runs can claim concurrently

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::constants::storage as storage_constants;
use crate::types::{PoolError, Result, ResultExt};

/// Shared database handle for async contexts.
pub type SharedDatabase = Arc<Database>;

const SCHEMA: &str = include_str!("schema.sql");

/// Current schema version for migration tracking
const SCHEMA_VERSION: u32 = 1;

/// Migration definitions
struct Migration {
    version: u32,
    description: &'static str,
    up: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "Add claim-order index",
    up: "CREATE INDEX IF NOT EXISTS idx_problems_claim_order
             ON problems (topic, difficulty, consumed, created_at)",
}];

/// Connection pool configuration
///
/// Pool size is derived from CPU cores unless configured explicitly.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool
    pub max_size: u32,
    /// Minimum idle connections to keep ready
    pub min_idle: u32,
    /// Timeout for acquiring a connection (seconds)
    pub connection_timeout_secs: u64,
    /// SQLite busy timeout (milliseconds)
    pub busy_timeout_ms: u64,
}

impl PoolConfig {
    /// Minimum pool size regardless of CPU count
    const MIN_POOL_SIZE: u32 = 4;
    /// Maximum pool size regardless of CPU count
    const MAX_POOL_SIZE: u32 = 32;
    /// Multiplier for CPU cores to pool size
    const POOL_SIZE_MULTIPLIER: f32 = 2.0;

    /// Formula: clamp(cores * 2, MIN, MAX)
    pub fn optimal_pool_size() -> u32 {
        let cores = std::thread::available_parallelism()
            .map(|p| p.get() as u32)
            .unwrap_or(4);

        let calculated = (cores as f32 * Self::POOL_SIZE_MULTIPLIER) as u32;
        calculated.clamp(Self::MIN_POOL_SIZE, Self::MAX_POOL_SIZE)
    }

    /// Create config with automatic pool sizing based on CPU cores
    pub fn auto() -> Self {
        Self::with_max_size(Self::optimal_pool_size())
    }

    /// Create config with an explicit pool size
    pub fn with_max_size(max_size: u32) -> Self {
        let max_size = max_size.max(1);
        Self {
            max_size,
            min_idle: (max_size / 4).clamp(1, 2),
            connection_timeout_secs: storage_constants::CONNECTION_TIMEOUT_SECS,
            busy_timeout_ms: storage_constants::BUSY_TIMEOUT_MS,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::auto()
    }
}

/// Thread-safe database with connection pooling.
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Open database with connection pooling at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, PoolConfig::default())
    }

    /// Open database with custom pool configuration.
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: PoolConfig) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let busy_timeout_ms = config.busy_timeout_ms;
        let manager = SqliteConnectionManager::file(path.as_ref())
            .with_init(move |conn| Self::configure_connection(conn, busy_timeout_ms));

        let pool = Pool::builder()
            .max_size(config.max_size)
            .min_idle(Some(config.min_idle))
            .connection_timeout(Duration::from_secs(config.connection_timeout_secs))
            .build(manager)
            .map_err(|e| PoolError::Storage(format!("Failed to create connection pool: {}", e)))?;

        Ok(Self { pool })
    }

    /// Open an in-memory database for testing or temporary use.
    ///
    /// Every in-memory connection is a separate database, so the pool holds one.
    pub fn open_in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory();

        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| PoolError::Storage(format!("Failed to create in-memory pool: {}", e)))?;

        Ok(Self { pool })
    }

    /// Configure a new file-backed connection.
    fn configure_connection(
        conn: &mut Connection,
        busy_timeout_ms: u64,
    ) -> std::result::Result<(), rusqlite::Error> {
        // journal_mode answers with the resulting mode, so it needs a query
        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.busy_timeout(Duration::from_millis(busy_timeout_ms))?;
        conn.execute_batch(
            r#"
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -16000;
            "#,
        )?;
        Ok(())
    }

    /// Get a connection from the pool.
    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| {
            PoolError::Storage(format!("Failed to acquire database connection: {}", e))
        })
    }

    /// Initialize database schema.
    pub fn initialize(&self) -> Result<()> {
        let conn = self.conn()?;
        let existing_version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0);

        conn.execute_batch(SCHEMA)
            .with_context("Failed to initialize database schema")?;
        drop(conn);

        if existing_version == 0 {
            // Fresh database: schema.sql already has every migration applied
            let conn = self.conn()?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)
                .with_context("Failed to set schema version")?;
            return Ok(());
        }

        self.migrate()
    }

    /// Run version-tracked migrations.
    fn migrate(&self) -> Result<()> {
        let conn = self.conn()?;

        let current_version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0);

        for migration in MIGRATIONS {
            if migration.version > current_version {
                conn.execute_batch(migration.up).with_context_fn(|| {
                    format!(
                        "Failed to apply migration {}: {}",
                        migration.version, migration.description
                    )
                })?;

                tracing::info!(
                    "Applied migration {}: {}",
                    migration.version,
                    migration.description
                );
            }
        }

        if current_version < SCHEMA_VERSION {
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)
                .with_context("Failed to update schema version")?;
        }

        Ok(())
    }

    /// Schema version recorded in the database file
    pub fn schema_version(&self) -> Result<u32> {
        let conn = self.conn()?;
        conn.pragma_query_value(None, "user_version", |row| row.get(0))
            .with_context("Failed to read schema version")
    }

    /// Get a raw connection for advanced operations.
    pub fn connection(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.conn()
    }

    /// Execute a function within a panic-safe database transaction.
    ///
    /// If the closure errors or panics, the transaction is rolled back and an
    /// error is returned instead of poisoning the connection pool.
    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + std::panic::UnwindSafe,
    {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .with_context("Failed to start transaction")?;

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(&tx)));

        match result {
            Ok(Ok(value)) => {
                tx.commit().with_context("Failed to commit transaction")?;
                Ok(value)
            }
            // Rolled back on drop
            Ok(Err(e)) => Err(e),
            Err(panic_payload) => {
                let panic_msg = panic_payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic_payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "Unknown panic".to_string());

                tracing::error!("Transaction panicked: {}", panic_msg);
                Err(PoolError::Storage(format!(
                    "Transaction panicked: {}",
                    panic_msg
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn table_names(db: &Database) -> Vec<String> {
        let conn = db.connection().unwrap();
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect()
    }

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory().expect("Failed to open in-memory database");
        db.initialize().expect("Failed to initialize schema");

        assert!(table_names(&db).contains(&"problems".to_string()));
        assert_eq!(db.schema_version().unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_file_database_uses_wal() {
        let dir = TempDir::new().unwrap();
        let db = Database::open_with_config(
            dir.path().join("nested/pool.db"),
            PoolConfig::with_max_size(2),
        )
        .unwrap();
        db.initialize().unwrap();

        let conn = db.connection().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pool.db");

        let db = Database::open_with_config(&path, PoolConfig::with_max_size(1)).unwrap();
        db.initialize().unwrap();
        db.initialize().unwrap();
        assert_eq!(db.schema_version().unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_migrates_unversioned_database() {
        let db = Database::open_in_memory().unwrap();
        {
            let conn = db.connection().unwrap();
            conn.execute_batch(
                "CREATE TABLE problems (
                    id TEXT PRIMARY KEY, topic TEXT NOT NULL, difficulty TEXT NOT NULL,
                    payload TEXT NOT NULL, consumed INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL, consumed_at TEXT
                );
                PRAGMA user_version = 0;",
            )
            .unwrap();
        }
        db.migrate().unwrap();
        assert_eq!(db.schema_version().unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_transaction_panic_safety() {
        let db = Database::open_in_memory().expect("Failed to open database");
        db.initialize().expect("Failed to initialize");

        let result = db.transaction(|_conn| {
            panic!("Intentional panic for testing");
            #[allow(unreachable_code)]
            Ok(())
        });

        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("panicked"));
        assert!(db.connection().is_ok());
    }

    #[test]
    fn test_transaction_error_rolls_back() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();

        let result: Result<()> = db.transaction(|conn| {
            conn.execute(
                "INSERT INTO problems (id, topic, difficulty, payload, created_at)
                 VALUES ('p1', 'Arrays', 'Easy', '{}', '2025-01-01T00:00:00Z')",
                [],
            )?;
            Err(PoolError::Storage("abort".into()))
        });
        assert!(result.is_err());

        let conn = db.connection().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM problems", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_pool_config_sizing() {
        let size = PoolConfig::optimal_pool_size();
        assert!(size >= PoolConfig::MIN_POOL_SIZE);
        assert!(size <= PoolConfig::MAX_POOL_SIZE);

        let auto = PoolConfig::auto();
        assert_eq!(auto.max_size, size);
        assert!(auto.min_idle <= auto.max_size);

        let tiny = PoolConfig::with_max_size(0);
        assert_eq!(tiny.max_size, 1);
        assert_eq!(tiny.min_idle, 1);
    }
}
