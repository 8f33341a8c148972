//! Caller-side deadlines
//!
//! The provider chain has no cancellation points inside its retry schedule,
//! so latency is bounded by wrapping the whole operation.
//!
//! ```ignore
//! let payload = with_timeout(
//!     Duration::from_secs(120),
//!     allocator.acquire(&key),
//!     "acquire",
//! ).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use crate::types::{PoolError, Result};

/// Execute an async operation with a timeout
///
/// Returns `PoolError::Timeout` if the operation doesn't complete within the
/// given duration. The inner future is dropped on expiry.
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(PoolError::timeout(operation_name, timeout)),
    }
}

/// Like [`with_timeout`], but the deadline is optional
pub async fn with_optional_timeout<T, F>(
    timeout: Option<Duration>,
    future: F,
    operation_name: &str,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout {
        Some(timeout) => with_timeout(timeout, future, operation_name).await,
        None => future.await,
    }
}
