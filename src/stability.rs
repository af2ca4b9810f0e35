//! Detection of fully written files
//!
//! A file counts as finished once two consecutive size samples, taken one poll
//! interval apart, agree. There is no cap on the number of samples:
//! a file that keeps growing keeps its pipeline waiting until it stops or shutdown
//! cancels the wait.

use crate::config::StabilityConfig;
use crate::error::{Error, Result};
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Outcome of feeding one size sample into a [`StabilityTracker`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// First sample; another one is needed
    Baseline(u64),
    /// Size differs from the previous sample
    Changed {
        /// Previous sample
        from: u64,
        /// Current sample
        to: u64,
    },
    /// Two consecutive samples agreed
    Stable(u64),
}

/// Size-sample state machine
#[derive(Debug, Default)]
pub struct StabilityTracker {
    last: Option<u64>,
    samples: u32,
    changes: u32,
}

impl StabilityTracker {
    /// Create a tracker with no samples
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a size sample
    pub fn observe(&mut self, size: u64) -> Step {
        self.samples += 1;
        let step = match self.last {
            None => Step::Baseline(size),
            Some(prev) if prev == size => Step::Stable(size),
            Some(prev) => {
                self.changes += 1;
                Step::Changed {
                    from: prev,
                    to: size,
                }
            }
        };
        self.last = Some(size);
        step
    }

    /// Number of samples observed so far
    pub fn samples(&self) -> u32 {
        self.samples
    }

    /// Number of times the size changed between samples
    pub fn changes(&self) -> u32 {
        self.changes
    }
}

/// Waits until a candidate file's size stops changing
#[derive(Clone, Debug)]
pub struct StabilityChecker {
    poll_interval: Duration,
}

impl StabilityChecker {
    /// Create a checker sampling every `poll_interval`
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    /// Create a checker from configuration
    pub fn from_config(config: &StabilityConfig) -> Self {
        Self::new(config.poll_interval)
    }

    /// Delay between samples
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Block until two consecutive samples of `path`'s size agree
    ///
    /// Returns the settled size in bytes.
    ///
    /// # Errors
    /// - [`Error::NotFound`] if the file disappears between samples
    /// - [`Error::Cancelled`] if `cancel` fires while waiting
    pub async fn wait_until_stable(&self, path: &Path, cancel: &CancellationToken) -> Result<u64> {
        let mut tracker = StabilityTracker::new();

        loop {
            let size = sample_size(path).await?;

            match tracker.observe(size) {
                Step::Stable(size) => {
                    if tracker.changes() > 0 {
                        info!(?path, size, samples = tracker.samples(), "download completed");
                    } else {
                        debug!(?path, size, "file size is stable");
                    }
                    return Ok(size);
                }
                Step::Changed { from, to } => {
                    if tracker.changes() == 1 {
                        info!(?path, from, to, "file is still being written, waiting");
                    } else {
                        debug!(?path, from, to, "file size still changing");
                    }
                }
                Step::Baseline(size) => {
                    debug!(?path, size, "sampled initial size");
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}

async fn sample_size(path: &Path) -> Result<u64> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| Error::from_io(path, e))?;
    Ok(meta.len())
}
