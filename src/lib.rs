//! # auto-unzip
//!
//! Watches a directory for newly arriving ZIP archives, extracts each one into a
//! sibling folder named after the archive, and removes the original.
//!
//! Archives may still be mid-write when they first appear, so every archive goes
//! through its own pipeline: a short debounce, size-stability polling, validated
//! extraction, then deletion with retry while other processes release the file.
//!
//! ## Quick Start
//!
//! ```no_run
//! use auto_unzip::{Config, run_with_shutdown};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::new("/home/me/Downloads");
//!
//!     // Watches until SIGINT/SIGTERM, then drains in-flight archives
//!     run_with_shutdown(config).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Observing outcomes
//!
//! All diagnostics go through `tracing`; install any subscriber to receive them.
//! For programmatic access, [`IntakeCoordinator::subscribe`] yields an [`Event`]
//! for every stage transition.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Source archive removal with retry
pub mod cleanup;
/// Configuration types
pub mod config;
/// Event intake and per-archive pipelines
pub mod coordinator;
/// Error types
pub mod error;
/// Archive extraction
pub mod extraction;
/// Log output setup
pub mod logging;
/// Retry logic with backoff
pub mod retry;
/// File size stabilization
pub mod stability;
/// Core types and events
pub mod types;
/// Filesystem event source
pub mod watcher;

// Re-export commonly used types
pub use cleanup::{FsRemover, SourceCleaner, SourceRemover};
pub use config::Config;
pub use coordinator::{InFlightSet, IntakeCoordinator};
pub use error::{Error, ErrorKind, Result};
pub use extraction::ArchiveExtractor;
pub use stability::StabilityChecker;
pub use types::{Event, ExtractionSummary, Stage, WatchEvent, WatchEventKind};

use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};
use watcher::FolderWatcher;

/// Watch `config.watch_dir` until a termination signal arrives.
///
/// Validates the configuration first; a missing or unusable watch directory is
/// returned as [`Error::Config`] before anything is watched. On SIGINT/SIGTERM
/// (Ctrl+C on other platforms) the event loop stops and in-flight archives are
/// given `config.shutdown_timeout` to finish.
pub async fn run_with_shutdown(config: Config) -> Result<()> {
    run_until(config, wait_for_signal()).await
}

/// Watch `config.watch_dir` until `shutdown` completes or the event loop ends
///
/// Same as [`run_with_shutdown`] with a caller-supplied stop condition.
pub async fn run_until<F>(config: Config, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    config.validate()?;

    let (tx, rx) = mpsc::unbounded_channel();
    let mut watcher = FolderWatcher::new(&config.watch_dir, tx)?;
    watcher.start()?;

    let coordinator = IntakeCoordinator::new(&config);
    let mut event_loop = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.run(rx).await })
    };

    info!("Watcher started. Monitoring for new archives...");
    let finished = wait_for_stop(&mut event_loop, shutdown).await;

    watcher.stop();
    coordinator.shutdown().await;
    let joined = match finished {
        Some(joined) => joined,
        None => event_loop.await,
    };
    joined.map_err(|e| Error::Other(format!("event loop task failed: {}", e)))?;

    info!("Watcher stopped.");
    Ok(())
}

/// Wait for `shutdown` or for the event loop to end on its own
///
/// Returns the loop's join result if it ended first.
async fn wait_for_stop<F>(
    event_loop: &mut JoinHandle<()>,
    shutdown: F,
) -> Option<std::result::Result<(), JoinError>>
where
    F: Future<Output = ()>,
{
    tokio::select! {
        _ = shutdown => None,
        joined = event_loop => {
            warn!("event loop exited before shutdown was requested");
            Some(joined)
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM signal"),
                _ = sigint.recv() => info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (sigterm, sigint) => {
            warn!(
                sigterm = sigterm.is_ok(),
                sigint = sigint.is_ok(),
                "could not register signal handlers, falling back to ctrl_c"
            );
            wait_for_ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C signal"),
        Err(e) => error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}
