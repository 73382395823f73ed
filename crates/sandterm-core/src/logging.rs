//! File-backed tracing setup.
//!
//! The terminal owns stdout while in raw mode, so log records go to
//! `${SANDTERM_HOME}/logs/sandterm.log` instead.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::paths;

/// Environment variable holding the tracing filter directive.
pub const LOG_FILTER_ENV: &str = "SANDTERM_LOG";

const LOG_FILE_NAME: &str = "sandterm.log";

/// Installs the global subscriber writing to the default log directory.
///
/// Returns `None` when logging could not be set up; the caller keeps running.
/// The returned guard must stay alive for buffered records to be flushed.
pub fn init_logging() -> Option<WorkerGuard> {
    match init_logging_in(&paths::logs_dir()) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("Warning: logging disabled: {err:#}");
            None
        }
    }
}

/// Installs the global subscriber writing into `dir`.
///
/// # Errors
/// Returns an error if the directory cannot be created or a global
/// subscriber is already installed.
pub fn init_logging_in(dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let file_appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::info!(log_dir = %dir.display(), "logging initialized");
    Ok(guard)
}
