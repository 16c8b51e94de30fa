//! File logging setup.
//!
//! Log lines go to a single append-only file through a non-blocking
//! writer. Keep the returned [`WorkerGuard`] alive for the life of the
//! process; dropping it flushes and stops the writer.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use time::macros::format_description;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::EnvFilter;

/// Level used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Errors raised while installing the log subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to create log directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("failed to open log file: {0}")]
    Appender(#[from] InitError),

    #[error("failed to install log subscriber: {0}")]
    Subscriber(String),
}

/// Install a global subscriber writing to `path`.
///
/// Lines carry a local timestamp (`YYYY.MM.DD HH:MM:SS`); `RUST_LOG`
/// overrides the default `info` filter.
pub fn init_file_logging(path: &Path) -> Result<WorkerGuard, LoggingError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|source| LoggingError::CreateDir {
        path: dir.clone(),
        source,
    })?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| crate::config::DEFAULT_LOG_FILE.to_string());

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(&dir)?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));
    let timer = LocalTime::new(format_description!(
        "[year].[month].[day] [hour]:[minute]:[second]"
    ));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(timer)
        .with_writer(writer)
        .with_ansi(false)
        .with_thread_ids(true)
        .try_init()
        .map_err(|e| LoggingError::Subscriber(e.to_string()))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_logging_writes_lines() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("logs/multi-get.log");

        let guard = init_file_logging(&path).unwrap();
        tracing::info!(bytes = 42, "logging smoke test");
        drop(guard);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("logging smoke test"));
        assert!(contents.contains("bytes=42"));

        let second = init_file_logging(&temp.path().join("other.log"));
        assert!(matches!(second, Err(LoggingError::Subscriber(_))));
    }
}
