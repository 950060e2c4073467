//! Timeout enforcement.
//!
//! # Responsibilities
//! - Race a protected call against its deadline
//! - Convert a deadline breach into a typed timeout failure
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from operation errors
//! - On timeout the operation future is dropped: a cooperative future stops
//!   at its next await point, but work it already handed to other tasks
//!   keeps running and its result is never observed

use std::future::Future;
use std::time::Duration;
use tokio::time;

use crate::resilience::error::BreakerError;

/// Run `operation` with a deadline of `timeout`.
///
/// The deadline timer lives inside the returned future, so it is cleared as
/// soon as either side finishes.
pub async fn with_timeout<T, E, Fut>(operation: Fut, timeout: Duration) -> Result<T, BreakerError<E>>
where
    Fut: Future<Output = Result<T, E>>,
{
    match time::timeout(timeout, operation).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(BreakerError::Operation(e)),
        Err(_) => Err(BreakerError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

/// Run `operation` with an optional deadline.
pub async fn maybe_with_timeout<T, E, Fut>(
    operation: Fut,
    timeout: Option<Duration>,
) -> Result<T, BreakerError<E>>
where
    Fut: Future<Output = Result<T, E>>,
{
    match timeout {
        Some(limit) => with_timeout(operation, limit).await,
        None => operation.await.map_err(BreakerError::Operation),
    }
}
