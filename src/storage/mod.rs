pub mod database;
pub mod pool_store;

pub use database::{Database, PoolConfig, SharedDatabase};
pub use pool_store::{PoolStore, SharedPoolStore, SqlitePoolStore};
