//! auto-unzip - unpack archives as they land in a directory

use auto_unzip::{Config, logging, run_with_shutdown};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

/// Watch a directory and extract every new ZIP archive into a sibling folder
#[derive(Debug, Parser)]
#[command(name = "auto-unzip", version, about)]
struct Cli {
    /// Directory to watch
    #[arg(env = "AUTO_UNZIP_WATCH_DIR")]
    watch_dir: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long, env = "AUTO_UNZIP_CONFIG")]
    config: Option<PathBuf>,

    /// Append log output to this file as well
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log level when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn into_config(self) -> auto_unzip::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(dir) = self.watch_dir {
            config.watch_dir = dir;
        }
        if let Some(file) = self.log_file {
            config.logging.file = Some(file);
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }

        // Events carry absolute paths; keep the watch root absolute as well
        if let Ok(absolute) = std::fs::canonicalize(&config.watch_dir) {
            config.watch_dir = absolute;
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("auto-unzip: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init(&config.logging) {
        eprintln!("auto-unzip: {e}");
        return ExitCode::FAILURE;
    }

    info!("Auto Unzip Watcher v{} starting", env!("CARGO_PKG_VERSION"));
    info!("Monitoring directory: {}", config.watch_dir.display());

    match run_with_shutdown(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_fatal() => {
            error!(error = %e, "cannot start watcher");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!(error = %e, "watcher terminated");
            ExitCode::FAILURE
        }
    }
}
