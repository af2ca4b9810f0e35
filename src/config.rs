//! Configuration types for auto-unzip

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Size-stability polling settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StabilityConfig {
    /// Delay between two size samples (default: 1 second)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
        }
    }
}

/// Retry configuration for transient failures
///
/// `max_attempts` counts every attempt including the first one.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt (default: 2 seconds)
    #[serde(default = "default_retry_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between attempts (default: 2 seconds)
    #[serde(default = "default_retry_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 1.0, i.e. fixed delay)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_retry_delay(),
            max_delay: default_retry_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
        }
    }
}

/// Source archive removal settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Wait before the first deletion attempt so lingering handles get released (default: 1 second)
    #[serde(default = "default_grace_delay", with = "duration_serde")]
    pub grace_delay: Duration,

    /// Retry policy for lock-style deletion failures
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            grace_delay: default_grace_delay(),
            retry: RetryConfig::default(),
        }
    }
}

/// Log output settings used by the binary
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset (default: "info")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Optional file that receives a copy of every log line
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Main configuration for the intake watcher
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Directory to watch (non-recursively) for new archives
    #[serde(default)]
    pub watch_dir: PathBuf,

    /// Archive extension to react to, without the dot, compared case-insensitively (default: "zip")
    #[serde(default = "default_archive_extension")]
    pub archive_extension: String,

    /// Wait after the triggering event before stability polling starts (default: 2 seconds)
    #[serde(default = "default_debounce", with = "duration_serde")]
    pub debounce: Duration,

    /// Size-stability polling
    #[serde(default)]
    pub stability: StabilityConfig,

    /// Source archive removal
    #[serde(default)]
    pub cleanup: CleanupConfig,

    /// How long shutdown waits for in-flight archives (default: 30 seconds)
    #[serde(default = "default_shutdown_timeout", with = "duration_serde")]
    pub shutdown_timeout: Duration,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watch_dir: PathBuf::new(),
            archive_extension: default_archive_extension(),
            debounce: default_debounce(),
            stability: StabilityConfig::default(),
            cleanup: CleanupConfig::default(),
            shutdown_timeout: default_shutdown_timeout(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Create a default configuration watching `watch_dir`
    pub fn new(watch_dir: impl Into<PathBuf>) -> Self {
        Self {
            watch_dir: watch_dir.into(),
            ..Default::default()
        }
    }

    /// Load configuration from a JSON file
    ///
    /// Missing fields fall back to their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read config file {}: {}", path.display(), e),
            key: None,
        })?;
        serde_json::from_str(&raw).map_err(|e| Error::Config {
            message: format!("invalid config file {}: {}", path.display(), e),
            key: None,
        })
    }

    /// Check that the configuration can be used to start watching
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the watch directory is missing or not a directory,
    /// the archive extension is empty, or the retry policy allows no attempts.
    pub fn validate(&self) -> Result<()> {
        if self.watch_dir.as_os_str().is_empty() {
            return Err(Error::Config {
                message: "no watch directory configured".to_string(),
                key: Some("watch_dir".to_string()),
            });
        }

        match std::fs::metadata(&self.watch_dir) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(Error::Config {
                    message: format!("{} is not a directory", self.watch_dir.display()),
                    key: Some("watch_dir".to_string()),
                });
            }
            Err(e) => {
                return Err(Error::Config {
                    message: format!(
                        "watch directory {} not found: {}",
                        self.watch_dir.display(),
                        e
                    ),
                    key: Some("watch_dir".to_string()),
                });
            }
        }

        if self.archive_extension.trim_start_matches('.').is_empty() {
            return Err(Error::Config {
                message: "archive extension must not be empty".to_string(),
                key: Some("archive_extension".to_string()),
            });
        }

        if self.cleanup.retry.max_attempts == 0 {
            return Err(Error::Config {
                message: "at least one deletion attempt is required".to_string(),
                key: Some("cleanup.retry.max_attempts".to_string()),
            });
        }

        if self.stability.poll_interval < Duration::from_secs(1) {
            tracing::warn!(
                poll_interval_ms = self.stability.poll_interval.as_millis(),
                "stability poll interval below one second may treat slow writers as finished"
            );
        }

        Ok(())
    }

    /// Archive extension without a leading dot
    pub fn extension(&self) -> &str {
        self.archive_extension.trim_start_matches('.')
    }
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

fn default_grace_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_archive_extension() -> String {
    "zip".to_string()
}

fn default_debounce() -> Duration {
    Duration::from_secs(2)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
