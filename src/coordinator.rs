//! Archive intake coordination
//!
//! The [`IntakeCoordinator`] consumes [`WatchEvent`]s, keeps the ones that name a
//! new archive, and runs each archive through its own pipeline task:
//!
//! 1. Detected - wait out the debounce delay
//! 2. Stabilizing - poll until the size stops changing
//! 3. Extracting - unpack into the sibling directory
//! 4. Cleaning - delete the source archive
//!
//! A failure in any stage ends that archive's pipeline only. An [`InFlightSet`]
//! guarantees at most one pipeline per path, no matter how many events a
//! single download produces.

use crate::cleanup::SourceCleaner;
use crate::config::Config;
use crate::error::{Error, ErrorKind, Result};
use crate::extraction::{ArchiveExtractor, extraction_target, has_archive_extension};
use crate::stability::StabilityChecker;
use crate::types::{Event, ExtractionSummary, Stage, WatchEvent, WatchEventKind};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Paths whose pipelines are currently running
///
/// Membership check and insertion happen under one lock, so two events racing
/// for the same path cannot both win.
#[derive(Debug, Default)]
pub struct InFlightSet {
    paths: Mutex<HashSet<PathBuf>>,
}

impl InFlightSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        // The set stays consistent even if a holder panicked mid-operation
        self.paths.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark `path` as in flight; returns `false` if it already was
    pub fn try_acquire(&self, path: &Path) -> bool {
        self.lock().insert(path.to_path_buf())
    }

    /// Clear the in-flight mark for `path`; returns `false` if it was not set
    pub fn release(&self, path: &Path) -> bool {
        self.lock().remove(path)
    }

    /// Whether `path` is currently in flight
    pub fn contains(&self, path: &Path) -> bool {
        self.lock().contains(path)
    }

    /// Number of paths in flight
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is in flight
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Acquire `path` and return a guard that releases it when dropped
    pub fn acquire(self: &Arc<Self>, path: &Path) -> Option<InFlightGuard> {
        self.try_acquire(path).then(|| InFlightGuard {
            set: Arc::clone(self),
            path: path.to_path_buf(),
        })
    }
}

/// Releases an [`InFlightSet`] entry on drop, including during unwinding
#[derive(Debug)]
pub struct InFlightGuard {
    set: Arc<InFlightSet>,
    path: PathBuf,
}

impl InFlightGuard {
    /// The guarded path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.release(&self.path);
    }
}

struct Inner {
    extension: String,
    debounce: Duration,
    shutdown_timeout: Duration,
    checker: StabilityChecker,
    extractor: ArchiveExtractor,
    cleaner: SourceCleaner,
    in_flight: Arc<InFlightSet>,
    event_tx: broadcast::Sender<Event>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

/// Watches an event stream and runs one intake pipeline per new archive
#[derive(Clone)]
pub struct IntakeCoordinator {
    inner: Arc<Inner>,
}

impl IntakeCoordinator {
    /// Create a coordinator that deletes archives from the real filesystem
    pub fn new(config: &Config) -> Self {
        Self::with_cleaner(config, SourceCleaner::new(config.cleanup.clone()))
    }

    /// Create a coordinator with a custom [`SourceCleaner`]
    pub fn with_cleaner(config: &Config, cleaner: SourceCleaner) -> Self {
        let (event_tx, _rx) = broadcast::channel(1000);
        Self {
            inner: Arc::new(Inner {
                extension: config.extension().to_string(),
                debounce: config.debounce,
                shutdown_timeout: config.shutdown_timeout,
                checker: StabilityChecker::from_config(&config.stability),
                extractor: ArchiveExtractor::new(),
                cleaner,
                in_flight: Arc::new(InFlightSet::new()),
                event_tx,
                cancel: CancellationToken::new(),
                tracker: TaskTracker::new(),
            }),
        }
    }

    /// Subscribe to pipeline events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.event_tx.subscribe()
    }

    /// Paths currently being processed
    pub fn in_flight(&self) -> &InFlightSet {
        &self.inner.in_flight
    }

    /// Token that stops the event loop and abandons waiting pipelines when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// Whether `event` should start a pipeline
    ///
    /// Only creations and rename destinations of non-directory paths carrying the
    /// archive extension qualify.
    pub fn is_candidate(&self, event: &WatchEvent) -> bool {
        matches!(
            event.kind,
            WatchEventKind::Created | WatchEventKind::RenamedInto
        ) && !event.is_dir
            && has_archive_extension(&event.path, &self.inner.extension)
    }

    /// Handle one filesystem event
    ///
    /// Returns the handle of the spawned pipeline, or `None` if the event was
    /// filtered out or the path is already in flight.
    pub fn handle_event(&self, event: WatchEvent) -> Option<JoinHandle<()>> {
        if !self.is_candidate(&event) {
            debug!(path = ?event.path, kind = ?event.kind, "ignoring event");
            return None;
        }

        if self.inner.cancel.is_cancelled() {
            debug!(path = ?event.path, "shutting down, ignoring event");
            return None;
        }

        let Some(guard) = self.inner.in_flight.acquire(&event.path) else {
            debug!(path = ?event.path, "archive already being processed, ignoring event");
            self.emit(Event::Duplicate { path: event.path });
            return None;
        };

        let inner = Arc::clone(&self.inner);
        Some(self.inner.tracker.spawn(async move {
            run_pipeline(inner, guard).await;
        }))
    }

    /// Consume events until the channel closes or shutdown is requested
    pub async fn run(&self, mut events: mpsc::UnboundedReceiver<WatchEvent>) {
        info!("intake coordinator started");

        loop {
            tokio::select! {
                _ = self.inner.cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => {
                        self.handle_event(event);
                    }
                    None => break,
                },
            }
        }

        info!("intake coordinator stopped");
    }

    /// Stop accepting events and wait for in-flight archives
    ///
    /// Pipelines still debouncing or stabilizing are abandoned; extractions and
    /// deletions already running are allowed to finish within the configured
    /// shutdown timeout.
    pub async fn shutdown(&self) {
        info!("stopping watcher");
        self.inner.cancel.cancel();
        self.inner.tracker.close();

        match tokio::time::timeout(self.inner.shutdown_timeout, self.inner.tracker.wait()).await {
            Ok(()) => info!("all in-flight archives finished"),
            Err(_) => warn!(
                in_flight = self.inner.in_flight.len(),
                "timed out waiting for in-flight archives, abandoning them"
            ),
        }
    }

    fn emit(&self, event: Event) {
        self.inner.event_tx.send(event).ok();
    }
}

impl Inner {
    fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    async fn wait_or_cancel(&self, delay: Duration) -> Result<()> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

async fn run_pipeline(inner: Arc<Inner>, guard: InFlightGuard) {
    let path = guard.path().to_path_buf();
    info!(?path, "detected new archive");
    inner.emit(Event::Detected { path: path.clone() });

    match process(&inner, &path).await {
        Ok(summary) => {
            info!(?path, target = ?summary.target, "completed processing");
            inner.emit(Event::Completed {
                path: path.clone(),
                target: summary.target,
            });
        }
        Err((stage, e)) => {
            let kind = e.kind();
            match kind {
                ErrorKind::Cancelled => info!(?path, %stage, "processing abandoned on shutdown"),
                ErrorKind::InvalidArchive => error!(?path, %stage, error = %e, "not a valid archive"),
                ErrorKind::PermissionDenied => {
                    error!(?path, %stage, error = %e, "permission denied while processing archive")
                }
                _ => error!(?path, %stage, ?kind, error = %e, "error processing archive"),
            }
            inner.emit(Event::Failed {
                path: path.clone(),
                stage,
                kind,
                error: e.to_string(),
            });
        }
    }

    drop(guard);
}

async fn process(inner: &Inner, path: &Path) -> std::result::Result<ExtractionSummary, (Stage, Error)> {
    inner
        .wait_or_cancel(inner.debounce)
        .await
        .map_err(|e| (Stage::Detected, e))?;

    inner.emit(Event::Stabilizing {
        path: path.to_path_buf(),
    });
    let size = inner
        .checker
        .wait_until_stable(path, &inner.cancel)
        .await
        .map_err(|e| (Stage::Stabilizing, e))?;
    inner.emit(Event::Stable {
        path: path.to_path_buf(),
        size,
    });

    if inner.cancel.is_cancelled() {
        return Err((Stage::Stabilizing, Error::Cancelled));
    }

    let target = extraction_target(path).map_err(|e| (Stage::Extracting, e))?;
    inner.emit(Event::Extracting {
        path: path.to_path_buf(),
        target: target.clone(),
    });
    let summary = inner
        .extractor
        .extract_to(path, &target)
        .await
        .map_err(|e| (Stage::Extracting, e))?;
    info!(?path, target = ?summary.target, entries = summary.entries, "successfully extracted archive");
    inner.emit(Event::Extracted {
        path: path.to_path_buf(),
        target: summary.target.clone(),
        entries: summary.entries,
    });

    inner.emit(Event::Cleaning {
        path: path.to_path_buf(),
    });
    inner
        .cleaner
        .remove_notify(path, |attempt, max_attempts| {
            inner.emit(Event::DeleteRetry {
                path: path.to_path_buf(),
                attempt,
                max_attempts,
            });
        })
        .await
        .map_err(|e| (Stage::Cleaning, e))?;

    Ok(summary)
}
