//! Collects tile load errors for display.
//!
//! Sources report a [`TiledLayerError`] when a tile's loader chain fails and
//! remove it when the tile loads or leaves the desired set. Errors are keyed
//! by URL, so re-reporting the same URL replaces the entry.

use dashmap::DashMap;
use serde::Serialize;
use tracing::debug;

use crate::loader::LoaderStatus;
use crate::tile::RectCoord;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TiledLayerError {
    pub status: LoaderStatus,
    pub error_code: Option<String>,
    pub layer_name: String,
    pub url: String,
    /// Whether a reload may succeed (timeouts, network failures).
    pub is_recoverable: bool,
    pub bounds: Option<RectCoord>,
}

impl TiledLayerError {
    pub fn new(
        layer_name: impl Into<String>,
        url: impl Into<String>,
        status: LoaderStatus,
    ) -> Self {
        Self {
            status,
            error_code: None,
            layer_name: layer_name.into(),
            url: url.into(),
            is_recoverable: status.is_recoverable(),
            bounds: None,
        }
    }

    pub fn with_error_code(mut self, error_code: Option<String>) -> Self {
        self.error_code = error_code;
        self
    }

    pub fn with_bounds(mut self, bounds: RectCoord) -> Self {
        self.bounds = Some(bounds);
        self
    }
}

/// Receives tile errors from sources.
///
/// Called from source actors; implementations must not call back into the
/// reporting source synchronously.
pub trait ErrorManager: Send + Sync {
    fn add_tiled_layer_error(&self, error: TiledLayerError);

    fn remove_error(&self, url: &str);

    fn clear_all_errors(&self);
}

/// Concurrent in-memory [`ErrorManager`].
#[derive(Debug, Default)]
pub struct DefaultErrorManager {
    errors: DashMap<String, TiledLayerError>,
}

impl DefaultErrorManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current errors, sorted by URL.
    pub fn errors(&self) -> Vec<TiledLayerError> {
        let mut errors: Vec<_> = self.errors.iter().map(|entry| entry.value().clone()).collect();
        errors.sort_by(|a, b| a.url.cmp(&b.url));
        errors
    }

    pub fn get(&self, url: &str) -> Option<TiledLayerError> {
        self.errors.get(url).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.errors.contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl ErrorManager for DefaultErrorManager {
    fn add_tiled_layer_error(&self, error: TiledLayerError) {
        debug!(
            url = %error.url,
            layer = %error.layer_name,
            status = %error.status,
            "Tile error recorded"
        );
        self.errors.insert(error.url.clone(), error);
    }

    fn remove_error(&self, url: &str) {
        self.errors.remove(url);
    }

    fn clear_all_errors(&self) {
        self.errors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_replace_remove() {
        let manager = DefaultErrorManager::new();
        let timeout = TiledLayerError::new("osm", "1/0/0", LoaderStatus::ErrorTimeout);
        let missing = TiledLayerError::new("osm", "1/0/0", LoaderStatus::Error404)
            .with_error_code(Some("404".into()));
        let other = TiledLayerError::new("osm", "0/0/0", LoaderStatus::ErrorOther);
        manager.add_tiled_layer_error(timeout);
        manager.add_tiled_layer_error(missing);
        manager.add_tiled_layer_error(other);

        assert_eq!(manager.len(), 2);
        let replaced = manager.get("1/0/0").unwrap();
        assert_eq!(replaced.status, LoaderStatus::Error404);
        assert!(!replaced.is_recoverable);

        let urls: Vec<_> = manager.errors().into_iter().map(|e| e.url).collect();
        assert_eq!(urls, vec!["0/0/0", "1/0/0"]);

        manager.remove_error("0/0/0");
        assert!(!manager.contains("0/0/0"));
        manager.clear_all_errors();
        assert!(manager.is_empty());
    }

    #[test]
    fn test_recoverable_follows_status() {
        assert!(TiledLayerError::new("l", "u", LoaderStatus::ErrorNetwork).is_recoverable);
        assert!(!TiledLayerError::new("l", "u", LoaderStatus::Error400).is_recoverable);
    }
}
