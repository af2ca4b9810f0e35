//! Removal of source archives after extraction
//!
//! Freshly extracted archives are often still held open for a moment by
//! another process (virus scanners, sync clients, indexers). Deletion therefore
//! waits a short grace period and retries lock-style failures a bounded number
//! of times. Running out of attempts is reported but never stops the watcher.

use crate::config::CleanupConfig;
use crate::error::{Error, Result};
use crate::retry::retry_with_backoff_notify;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Deletes a file from disk
///
/// Implemented by [`FsRemover`] for real use; tests substitute implementations
/// that simulate a file held open by another process.
#[async_trait]
pub trait SourceRemover: Send + Sync {
    /// Remove the file at `path`
    async fn remove(&self, path: &Path) -> std::io::Result<()>;
}

/// [`SourceRemover`] backed by `tokio::fs::remove_file`
#[derive(Clone, Copy, Debug, Default)]
pub struct FsRemover;

#[async_trait]
impl SourceRemover for FsRemover {
    async fn remove(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::remove_file(path).await
    }
}

/// Deletes source archives with grace delay and bounded retry
#[derive(Clone)]
pub struct SourceCleaner {
    config: CleanupConfig,
    remover: Arc<dyn SourceRemover>,
}

impl std::fmt::Debug for SourceCleaner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceCleaner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SourceCleaner {
    /// Create a cleaner that deletes from the real filesystem
    pub fn new(config: CleanupConfig) -> Self {
        Self::with_remover(config, Arc::new(FsRemover))
    }

    /// Create a cleaner with a custom removal strategy
    pub fn with_remover(config: CleanupConfig, remover: Arc<dyn SourceRemover>) -> Self {
        Self { config, remover }
    }

    /// Delete `path`
    ///
    /// Returns the number of attempts it took.
    pub async fn remove(&self, path: &Path) -> Result<u32> {
        self.remove_notify(path, |_, _| {}).await
    }

    /// Delete `path`, calling `on_retry(failed_attempt, max_attempts)` before each retry
    ///
    /// A file that is already gone counts as removed.
    ///
    /// # Errors
    /// Returns [`Error::DeleteFailed`] when a non-retryable error occurs or every
    /// attempt hit a lock-style failure. The file is left on disk in both cases.
    pub async fn remove_notify<N>(&self, path: &Path, mut on_retry: N) -> Result<u32>
    where
        N: FnMut(u32, u32),
    {
        let max_attempts = self.config.retry.max_attempts.max(1);

        debug!(
            ?path,
            grace_ms = self.config.grace_delay.as_millis(),
            "waiting for file handles to be released"
        );
        tokio::time::sleep(self.config.grace_delay).await;

        let mut attempts = 0u32;
        let result = retry_with_backoff_notify(
            &self.config.retry,
            || {
                attempts += 1;
                let remover = Arc::clone(&self.remover);
                let path = path.to_path_buf();
                async move {
                    match remover.remove(&path).await {
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                            warn!(?path, "archive already removed by someone else");
                            Ok(())
                        }
                        other => other,
                    }
                }
            },
            |attempt, error, delay| {
                warn!(
                    ?path,
                    attempt,
                    max_attempts,
                    error = %error,
                    "could not delete archive, retrying in {:?} (attempt {}/{})",
                    delay,
                    attempt,
                    max_attempts
                );
                on_retry(attempt, max_attempts);
            },
        )
        .await;

        match result {
            Ok(()) => {
                info!(?path, attempts, "deleted original archive");
                Ok(attempts)
            }
            Err(source) => Err(Error::DeleteFailed {
                path: path.to_path_buf(),
                attempts,
                source,
            }),
        }
    }
}
