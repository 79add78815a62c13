//! Common types and utilities shared across CLI commands.

use std::path::Path;

use tileflow::config::{load_layer_config, ConfigFile};
use tileflow::tile::RectCoord;
use tracing::info;

use crate::error::CliError;

/// Load the configuration file, or defaults when no path is given.
///
/// A separate layer file replaces the config file's layer section.
pub fn load_config(config: Option<&Path>, layer: Option<&Path>) -> Result<ConfigFile, CliError> {
    let mut file = match config {
        Some(path) => {
            info!(path = %path.display(), "Loading config file");
            ConfigFile::load(path)?
        }
        None => ConfigFile::default(),
    };
    if let Some(path) = layer {
        file.layer = load_layer_config(path)?;
    }
    Ok(file)
}

/// Parse `left,top,right,bottom` into a rectangle.
pub fn parse_bounds(values: &[f64]) -> Result<RectCoord, CliError> {
    match values {
        [left, top, right, bottom] => {
            let bounds = RectCoord::from_corners(*left, *top, *right, *bottom);
            if bounds.width() <= 0.0 || bounds.height() <= 0.0 {
                return Err(CliError::Usage(format!(
                    "--bounds must span a non-empty area, got {},{},{},{}",
                    left, top, right, bottom
                )));
            }
            Ok(bounds)
        }
        _ => Err(CliError::Usage(format!(
            "--bounds takes four values (left,top,right,bottom), got {}",
            values.len()
        ))),
    }
}
