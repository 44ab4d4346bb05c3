//! Log setup: human-readable lines on stdout plus a daily log file under
//! the data directory.

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_LOG_FILTER: &str = "ticket_server=info,tower_http=warn";

/// Log files live in `<data_dir>/logs`.
pub const LOG_DIR: &str = "logs";

/// Files are named `ticket-server.YYYY-MM-DD.log`.
pub const LOG_FILE_PREFIX: &str = "ticket-server";

/// Days of log files kept before the oldest is deleted.
pub const MAX_LOG_FILES: usize = 7;

#[derive(Debug, thiserror::Error)]
pub enum LogInitError {
    #[error("failed to create log directory {path}: {source}")]
    Dir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to open log file: {0}")]
    Appender(#[from] InitError),
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Daily-rotating appender in `dir`, created if missing.
pub fn file_appender(dir: &Path) -> Result<RollingFileAppender, LogInitError> {
    std::fs::create_dir_all(dir).map_err(|source| LogInitError::Dir {
        path: dir.to_path_buf(),
        source,
    })?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(dir)?;
    Ok(appender)
}

/// Install the global subscriber writing to stdout and to the log file.
///
/// The returned guard flushes the file writer on drop, so hold it for the
/// life of the process.
pub fn init(data_dir: &Path) -> Result<WorkerGuard, LogInitError> {
    let (file, guard) = tracing_appender::non_blocking(file_appender(&data_dir.join(LOG_DIR))?);
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer())
        .with(fmt::layer().with_writer(file).with_ansi(false))
        .init();
    Ok(guard)
}

/// Stdout only, for when the log file can't be opened.
pub fn init_stdout() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer())
        .init();
}
