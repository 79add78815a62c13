//! JSON configuration files.
//!
//! ```json
//! {
//!   "layer": { "layer_name": "osm", "url_template": "{z}/{x}/{y}.png", "max_zoom_level": 18 },
//!   "source": { "outdated_tile_timeout_ms": 2000 },
//!   "loader_root": "/var/cache/tiles"
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::layer::GridLayerConfig;
use super::source::SourceConfig;
use crate::error::ConfigError;

/// Contents of a configuration file. Every section is optional.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub layer: GridLayerConfig,
    pub source: SourceConfig,
    /// Directory served by a file loader, if any.
    pub loader_root: Option<PathBuf>,
    /// Base URL for an HTTP loader, if any; tile URLs are appended.
    pub http_base_url: Option<String>,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads and validates a standalone layer configuration.
pub fn load_layer_config(path: &Path) -> Result<GridLayerConfig, ConfigError> {
    let layer: GridLayerConfig = read_json(path)?;
    layer.validate()?;
    Ok(layer)
}

impl ConfigFile {
    /// Reads and validates a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config: ConfigFile = read_json(path)?;
        config.layer.validate()?;
        debug!(path = %path.display(), layer = %config.layer.layer_name, "Loaded config file");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_valid_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "layer": {{"layer_name": "osm", "max_zoom_level": 3}},
                "source": {{"outdated_tile_timeout_ms": 10}}
            }}"#
        )
        .unwrap();

        let config = ConfigFile::load(file.path()).unwrap();
        assert_eq!(config.layer.layer_name, "osm");
        assert_eq!(config.source.outdated_tile_timeout_ms, 10);
        assert!(config.loader_root.is_none());
    }

    #[test]
    fn test_load_layer_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"layer_name": "relief", "url_template": "relief/{{z}}/{{x}}/{{y}}"}}"#
        )
        .unwrap();
        let layer = load_layer_config(file.path()).unwrap();
        assert_eq!(layer.layer_name, "relief");
        assert_eq!(layer.url_template, "relief/{z}/{x}/{y}");
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigFile::load(Path::new("/nonexistent/tileflow.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_malformed_json() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(ConfigFile::load(file.path()), Err(ConfigError::Json { .. })));
    }

    #[test]
    fn test_invalid_layer_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"layer": {{"min_zoom_level": 4, "max_zoom_level": 1}}}}"#).unwrap();
        assert!(matches!(ConfigFile::load(file.path()), Err(ConfigError::Invalid(_))));
    }
}
