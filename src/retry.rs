//! Retry logic with configurable backoff
//!
//! Runs an async operation up to `max_attempts` times, sleeping between attempts.
//! Only errors classified as transient by [`IsRetryable`] are retried; anything
//! else is returned immediately.
//!
//! # Example
//!
//! ```no_run
//! use auto_unzip::retry::{IsRetryable, retry_with_backoff};
//! use auto_unzip::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Locked,
//!     Gone,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Locked)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! retry_with_backoff(&config, || async {
//!     // Your operation here
//!     Ok::<_, MyError>(())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Lock and permission failures that another process may release shortly should
/// return `true`. Missing files, corrupt data and the like should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for std::io::Error {
    fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            std::io::ErrorKind::PermissionDenied | std::io::ErrorKind::ResourceBusy
        )
    }
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // Another process (scanner, indexer, the writer itself) holds the file
            Error::PermissionDenied { .. } => true,
            Error::Io(e) => e.is_retryable(),
            Error::NotFound { .. }
            | Error::InvalidArchive { .. }
            | Error::TraversalRejected { .. }
            | Error::DeleteFailed { .. }
            | Error::Config { .. }
            | Error::FolderWatch(_)
            | Error::Cancelled
            | Error::Serialization(_)
            | Error::Other(_) => false,
        }
    }
}

/// Execute an async operation with retry
///
/// See [`retry_with_backoff_notify`].
pub async fn retry_with_backoff<F, Fut, T, E>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    retry_with_backoff_notify(config, operation, |_, _, _| {}).await
}

/// Execute an async operation with retry, reporting every scheduled retry
///
/// `on_retry` receives the 1-based number of the attempt that just failed, its
/// error, and the delay before the next attempt.
///
/// # Returns
///
/// Returns the successful result, the first non-retryable error, or the last
/// error once `config.max_attempts` attempts have failed.
pub async fn retry_with_backoff_notify<F, Fut, T, E, N>(
    config: &RetryConfig,
    mut operation: F,
    mut on_retry: N,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
    N: FnMut(u32, &E, Duration),
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let wait = if config.jitter { add_jitter(delay) } else { delay };

                tracing::debug!(
                    error = %e,
                    attempt,
                    max_attempts,
                    delay_ms = wait.as_millis(),
                    "Operation failed, retrying"
                );
                on_retry(attempt, &e, wait);

                tokio::time::sleep(wait).await;

                let next_delay =
                    Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier);
                delay = next_delay.min(config.max_delay);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::error!(
                        error = %e,
                        attempts = attempt,
                        "Operation failed with non-retryable error"
                    );
                }
                return Err(e);
            }
        }
    }
}

/// Add random jitter to a delay to prevent thundering herd
///
/// The result lies between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
