//! Loader status codes and results.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Outcome of one loader attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoaderStatus {
    Ok,
    /// The loader does not handle this request; try the next one.
    Noop,
    Error400,
    Error404,
    ErrorTimeout,
    ErrorNetwork,
    ErrorOther,
}

impl LoaderStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, LoaderStatus::Ok)
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, LoaderStatus::Noop)
    }

    pub fn is_error(&self) -> bool {
        !self.is_ok() && !self.is_noop()
    }

    /// Transient failures that a later reload may fix.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, LoaderStatus::ErrorTimeout | LoaderStatus::ErrorNetwork)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoaderStatus::Ok => "OK",
            LoaderStatus::Noop => "NOOP",
            LoaderStatus::Error400 => "ERROR_400",
            LoaderStatus::Error404 => "ERROR_404",
            LoaderStatus::ErrorTimeout => "ERROR_TIMEOUT",
            LoaderStatus::ErrorNetwork => "ERROR_NETWORK",
            LoaderStatus::ErrorOther => "ERROR_OTHER",
        }
    }
}

impl fmt::Display for LoaderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded image handed out by texture loaders.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureHolder {
    pub width: u32,
    pub height: u32,
    /// Pixel data in the loader's native layout.
    pub data: Bytes,
}

/// Result of a load attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct LoaderResult<T> {
    pub status: LoaderStatus,
    pub data: Option<T>,
    pub etag: Option<String>,
    /// Loader-specific detail for failures (HTTP status, io error kind, ...).
    pub error_code: Option<String>,
}

impl<T> LoaderResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: LoaderStatus::Ok,
            data: Some(data),
            etag: None,
            error_code: None,
        }
    }

    pub fn noop() -> Self {
        Self {
            status: LoaderStatus::Noop,
            data: None,
            etag: None,
            error_code: None,
        }
    }

    pub fn error(status: LoaderStatus, error_code: Option<String>) -> Self {
        Self {
            status,
            data: None,
            etag: None,
            error_code,
        }
    }

    pub fn with_etag(mut self, etag: Option<String>) -> Self {
        self.etag = etag;
        self
    }
}

pub type DataLoaderResult = LoaderResult<Bytes>;
pub type TextureLoaderResult = LoaderResult<TextureHolder>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(LoaderStatus::Ok.is_ok());
        assert!(!LoaderStatus::Noop.is_error());
        assert!(LoaderStatus::Error404.is_error());
        assert!(!LoaderStatus::Error404.is_recoverable());
        assert!(LoaderStatus::ErrorTimeout.is_recoverable());
        assert!(LoaderStatus::ErrorNetwork.is_recoverable());
    }

    #[test]
    fn test_constructors() {
        let ok: DataLoaderResult =
            LoaderResult::ok(Bytes::from_static(b"x")).with_etag(Some("v1".into()));
        assert_eq!(ok.status, LoaderStatus::Ok);
        assert_eq!(ok.etag.as_deref(), Some("v1"));

        let failed: DataLoaderResult =
            LoaderResult::error(LoaderStatus::Error400, Some("400".into()));
        assert!(failed.data.is_none());
        assert_eq!(failed.error_code.as_deref(), Some("400"));
    }

    #[test]
    fn test_status_serde_name() {
        let name = serde_json::to_string(&LoaderStatus::ErrorTimeout).unwrap();
        assert_eq!(name, "\"ERROR_TIMEOUT\"");
    }
}
