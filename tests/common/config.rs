//! Configurations with timings short enough for tests

use auto_unzip::Config;
use auto_unzip::config::{CleanupConfig, RetryConfig, StabilityConfig};
use std::path::Path;
use std::time::Duration;

/// Configuration watching `watch_dir` with millisecond-scale delays
pub fn fast_config(watch_dir: &Path) -> Config {
    Config {
        debounce: Duration::from_millis(50),
        stability: StabilityConfig {
            poll_interval: Duration::from_millis(100),
        },
        cleanup: CleanupConfig {
            grace_delay: Duration::from_millis(10),
            retry: RetryConfig {
                max_attempts: 3,
                initial_delay: Duration::from_millis(20),
                max_delay: Duration::from_millis(20),
                backoff_multiplier: 1.0,
                jitter: false,
            },
        },
        shutdown_timeout: Duration::from_secs(5),
        ..Config::new(watch_dir)
    }
}
