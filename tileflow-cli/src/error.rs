//! CLI error handling with user-friendly messages.

use std::fmt;
use std::process;
use std::time::Duration;

use tileflow::error::{ConfigError, LoaderError, SchedulerError};
use tileflow::logging::LoggingError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(LoggingError),
    /// Configuration error
    Config(ConfigError),
    /// Invalid command-line arguments
    Usage(String),
    /// Failed to start the scheduler
    Scheduler(SchedulerError),
    /// Failed to construct a loader
    Loader(LoaderError),
    /// The simulated render loop gave up before the layer settled
    Timeout(Duration),
    /// Failed to encode output
    Output(serde_json::Error),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Loader(LoaderError::InvalidRoot(_)) => {
                eprintln!();
                eprintln!("The tile root must be an existing directory laid out like the");
                eprintln!("layer's URL template, e.g. tiles/3/4/2.png for");
                eprintln!("\"{{z}}/{{x}}/{{y}}.png\".");
            }
            CliError::Timeout(_) => {
                eprintln!();
                eprintln!("Raise --timeout-secs or run with RUST_LOG=debug to see pending loads.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Usage(msg) => write!(f, "{}", msg),
            CliError::Scheduler(e) => write!(f, "Failed to start scheduler: {}", e),
            CliError::Loader(e) => write!(f, "Failed to create loader: {}", e),
            CliError::Timeout(after) => {
                write!(f, "Layer did not settle within {:.1}s", after.as_secs_f64())
            }
            CliError::Output(e) => write!(f, "Failed to write output: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::LoggingInit(e) => Some(e),
            CliError::Config(e) => Some(e),
            CliError::Scheduler(e) => Some(e),
            CliError::Loader(e) => Some(e),
            CliError::Output(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::LoggingInit(e)
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<SchedulerError> for CliError {
    fn from(e: SchedulerError) -> Self {
        CliError::Scheduler(e)
    }
}

impl From<LoaderError> for CliError {
    fn from(e: LoaderError) -> Self {
        CliError::Loader(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Output(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_timeout_message() {
        let err = CliError::Timeout(Duration::from_millis(2500));
        assert_eq!(err.to_string(), "Layer did not settle within 2.5s");
        assert!(err.source().is_none());
    }

    #[test]
    fn test_config_error_has_source() {
        let invalid = ConfigError::Invalid("max_zoom_level below min_zoom_level".into());
        let err: CliError = invalid.into();
        assert!(err.to_string().starts_with("Configuration error:"));
        assert!(err.source().is_some());
    }
}
