//! Logging infrastructure.
//!
//! Structured `tracing` output to a log file and the console:
//! - Writes to `logs/tileflow.log` (cleared on session start)
//! - Also prints to stderr so command output on stdout stays clean
//! - Configurable via the `RUST_LOG` environment variable

use std::fs;
use std::io;
use std::path::Path;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_LOG_FILE: &str = "tileflow.log";
/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to prepare log file: {0}")]
    Io(#[from] io::Error),

    /// A global subscriber was already installed.
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard flushes and closes the log file writer.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Initialize file and console logging.
///
/// Creates the log directory if needed and truncates the previous log file.
///
/// # Arguments
///
/// * `log_dir` - Directory for log files (e.g., "logs")
/// * `log_file` - Log filename (e.g., "tileflow.log")
/// * `default_filter` - Filter directive used when `RUST_LOG` is unset
///
/// # Errors
///
/// Returns an error if the log file cannot be prepared or a global
/// subscriber is already installed.
pub fn init_logging(
    log_dir: &Path,
    log_file: &str,
    default_filter: &str,
) -> Result<LoggingGuard, LoggingError> {
    fs::create_dir_all(log_dir)?;
    fs::write(log_dir.join(log_file), "")?;

    let file_appender = tracing_appender::rolling::never(log_dir, log_file);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_span_events(FmtSpan::CLOSE);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter(default_filter))
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    Ok(LoggingGuard {
        _file_guard: Some(file_guard),
    })
}

/// Initialize console-only logging to stderr.
pub fn init_console_logging(default_filter: &str) -> Result<LoggingGuard, LoggingError> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_filter))
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    Ok(LoggingGuard { _file_guard: None })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_creates_directory_and_truncates_file() {
        let dir = TempDir::new().unwrap();
        let log_dir = dir.path().join("nested/logs");
        fs::create_dir_all(&log_dir).unwrap();
        fs::write(log_dir.join(DEFAULT_LOG_FILE), "stale contents").unwrap();

        // Only one test may install the global subscriber; a second install
        // surfaces as AlreadyInitialized rather than a panic.
        match init_logging(&log_dir, DEFAULT_LOG_FILE, DEFAULT_LOG_FILTER) {
            Ok(_guard) => {}
            Err(LoggingError::AlreadyInitialized(_)) => {}
            Err(e) => panic!("unexpected logging error: {e}"),
        }

        let contents = fs::read_to_string(log_dir.join(DEFAULT_LOG_FILE)).unwrap();
        assert!(!contents.contains("stale contents"));
    }

    #[test]
    fn test_second_init_is_an_error_not_a_panic() {
        let _ = init_console_logging(DEFAULT_LOG_FILTER);
        assert!(matches!(
            init_console_logging(DEFAULT_LOG_FILTER),
            Err(LoggingError::AlreadyInitialized(_))
        ));
    }
}
