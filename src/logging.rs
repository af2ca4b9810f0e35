//! Log output for the auto-unzip binary
//!
//! The library itself only emits `tracing` events; whoever embeds it decides
//! where they go. The binary installs a timestamped console layer and, when a
//! log file is configured, a second plain-text layer appending to that file.
//!
//! `RUST_LOG` takes precedence over the configured level:
//! ```bash
//! RUST_LOG=auto_unzip=debug auto-unzip ~/Downloads
//! ```

use crate::config::LoggingConfig;
use crate::error::{Error, Result};
use std::fs::OpenOptions;
use std::sync::{Mutex, Once};
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Local wall-clock timestamps: `YYYY-MM-DD HH:MM:SS.mmm`
struct LocalTime;

impl FormatTime for LocalTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

fn build_filter(config: &LoggingConfig) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(&config.level)
    }
}

/// Install the global subscriber
///
/// Safe to call more than once; only the first call takes effect.
///
/// # Errors
/// Returns [`Error::Config`] if the configured log file cannot be opened.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let file = match &config.file {
        Some(path) => Some(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| Error::Config {
                    message: format!("cannot open log file {}: {}", path.display(), e),
                    key: Some("logging.file".to_string()),
                })?,
        ),
        None => None,
    };

    INIT.call_once(|| {
        let console_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_timer(LocalTime)
            .with_level(true);

        let file_layer = file.map(|file| {
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_timer(LocalTime)
                .with_writer(Mutex::new(file))
        });

        // Another subscriber may already be installed (tests, embedding); keep it
        let _ = tracing_subscriber::registry()
            .with(build_filter(config))
            .with(console_layer)
            .with(file_layer)
            .try_init();
    });

    Ok(())
}
