//! Layer configuration: how a layer's tile pyramid is laid out and named.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::tile::zoom::{self, ZoomInfo, ZoomLevelInfo};
use crate::tile::RectCoord;

/// Half the width of the web mercator plane, in meters.
pub const WEB_MERCATOR_HALF_EXTENT: f64 = 20_037_508.342_789_244;

/// Scale denominator of web mercator level 0 at 256px tiles and 0.28mm pixels.
pub const WEB_MERCATOR_BASE_ZOOM: f64 = 559_082_264.028_717;

pub const DEFAULT_LAYER_NAME: &str = "grid";
pub const DEFAULT_URL_TEMPLATE: &str = "{z}/{x}/{y}";
pub const DEFAULT_MAX_ZOOM_LEVEL: i32 = 20;

/// Describes a tiled layer to a [`TiledSource`](crate::source::TiledSource).
pub trait LayerConfig: Send + Sync {
    fn layer_name(&self) -> &str;

    /// URL of one tile, handed to the loader chain.
    fn tile_url(&self, x: i32, y: i32, t: i32, zoom_identifier: i32) -> String;

    /// All levels of the pyramid, in any order.
    fn zoom_level_infos(&self) -> Vec<ZoomLevelInfo>;

    fn zoom_info(&self) -> ZoomInfo;

    /// Zoom identifier shown at scale `zoom`.
    fn zoom_identifier(&self, zoom: f64) -> i32 {
        let mut levels = self.zoom_level_infos();
        zoom::sort_coarse_to_fine(&mut levels);
        zoom::zoom_identifier_for(&levels, zoom)
    }

    /// Scale at which `identifier` is shown.
    fn zoom_factor_at_identifier(&self, identifier: f64) -> f64 {
        let mut levels = self.zoom_level_infos();
        zoom::sort_coarse_to_fine(&mut levels);
        zoom::zoom_factor_at_identifier(&levels, identifier)
    }
}

/// A regular power-of-two grid over a rectangular extent.
///
/// Level `n` splits the extent into `2^n` columns of square tiles, with as
/// many rows as needed to cover the extent's height. The URL template may
/// use `{x}`, `{y}`, `{z}` and `{t}` placeholders.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridLayerConfig {
    pub layer_name: String,
    pub url_template: String,
    pub bounds: RectCoord,
    /// Scale denominator of level 0; each level halves it.
    pub base_zoom: f64,
    pub min_zoom_level: i32,
    pub max_zoom_level: i32,
    pub num_time_steps: i32,
    pub zoom_info: ZoomInfo,
}

impl Default for GridLayerConfig {
    fn default() -> Self {
        Self {
            layer_name: DEFAULT_LAYER_NAME.to_string(),
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            bounds: RectCoord::from_corners(
                -WEB_MERCATOR_HALF_EXTENT,
                WEB_MERCATOR_HALF_EXTENT,
                WEB_MERCATOR_HALF_EXTENT,
                -WEB_MERCATOR_HALF_EXTENT,
            ),
            base_zoom: WEB_MERCATOR_BASE_ZOOM,
            min_zoom_level: 0,
            max_zoom_level: DEFAULT_MAX_ZOOM_LEVEL,
            num_time_steps: 1,
            zoom_info: ZoomInfo::default(),
        }
    }
}

impl GridLayerConfig {
    pub fn new(layer_name: impl Into<String>, url_template: impl Into<String>) -> Self {
        Self {
            layer_name: layer_name.into(),
            url_template: url_template.into(),
            ..Self::default()
        }
    }

    pub fn with_bounds(mut self, bounds: RectCoord) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_base_zoom(mut self, base_zoom: f64) -> Self {
        self.base_zoom = base_zoom;
        self
    }

    pub fn with_zoom_levels(mut self, min_zoom_level: i32, max_zoom_level: i32) -> Self {
        self.min_zoom_level = min_zoom_level;
        self.max_zoom_level = max_zoom_level;
        self
    }

    pub fn with_zoom_info(mut self, zoom_info: ZoomInfo) -> Self {
        self.zoom_info = zoom_info;
        self
    }

    pub fn with_time_steps(mut self, num_time_steps: i32) -> Self {
        self.num_time_steps = num_time_steps;
        self
    }

    /// Rejects configurations that cannot produce a pyramid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bounds.width() <= 0.0 || self.bounds.height() <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "layer '{}' has empty bounds",
                self.layer_name
            )));
        }
        if self.base_zoom <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "layer '{}' has non-positive base zoom",
                self.layer_name
            )));
        }
        if self.min_zoom_level < 0
            || self.max_zoom_level < self.min_zoom_level
            || self.max_zoom_level > 30
        {
            return Err(ConfigError::Invalid(format!(
                "layer '{}' has invalid zoom range {}..={}",
                self.layer_name, self.min_zoom_level, self.max_zoom_level
            )));
        }
        if self.num_time_steps < 1 {
            return Err(ConfigError::Invalid(format!(
                "layer '{}' needs at least one time step",
                self.layer_name
            )));
        }
        Ok(())
    }
}

impl LayerConfig for GridLayerConfig {
    fn layer_name(&self) -> &str {
        &self.layer_name
    }

    fn tile_url(&self, x: i32, y: i32, t: i32, zoom_identifier: i32) -> String {
        self.url_template
            .replace("{z}", &zoom_identifier.to_string())
            .replace("{x}", &x.to_string())
            .replace("{y}", &y.to_string())
            .replace("{t}", &t.to_string())
    }

    fn zoom_level_infos(&self) -> Vec<ZoomLevelInfo> {
        (self.min_zoom_level..=self.max_zoom_level)
            .map(|level| {
                let columns = 1i64 << level;
                let tile_width = self.bounds.width() / columns as f64;
                let rows = (self.bounds.height() / tile_width).ceil().max(1.0);
                ZoomLevelInfo {
                    zoom: self.base_zoom / columns as f64,
                    tile_width_layer_system_units: tile_width,
                    num_tiles_x: columns as i32,
                    num_tiles_y: rows as i32,
                    num_tiles_t: self.num_time_steps,
                    zoom_level_identifier: level,
                    bounds: self.bounds,
                }
            })
            .collect()
    }

    fn zoom_info(&self) -> ZoomInfo {
        self.zoom_info.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_url_substitution() {
        let config = GridLayerConfig::new("osm", "https://tiles.example/{z}/{x}/{y}.png?t={t}");
        assert_eq!(config.tile_url(3, 5, 1, 7), "https://tiles.example/7/3/5.png?t=1");
    }

    #[test]
    fn test_grid_levels() {
        let config = GridLayerConfig::default()
            .with_bounds(RectCoord::from_corners(0.0, 0.0, 4.0, 2.0))
            .with_base_zoom(1000.0)
            .with_zoom_levels(0, 2);
        let levels = config.zoom_level_infos();

        assert_eq!(levels.len(), 3);
        assert_eq!(levels[0].num_tiles_x, 1);
        assert_eq!(levels[0].num_tiles_y, 1);
        assert_eq!(levels[2].num_tiles_x, 4);
        assert_eq!(levels[2].num_tiles_y, 2);
        assert_eq!(levels[2].tile_width_layer_system_units, 1.0);
        assert_eq!(levels[1].zoom, 500.0);
    }

    #[test]
    fn test_default_identifier_conversion() {
        let config = GridLayerConfig::default().with_base_zoom(1024.0).with_zoom_levels(0, 10);
        assert_eq!(config.zoom_identifier(256.0), 2);
        assert_eq!(config.zoom_factor_at_identifier(2.0), 256.0);
    }

    #[test]
    fn test_validate() {
        assert!(GridLayerConfig::default().validate().is_ok());
        let empty =
            GridLayerConfig::default().with_bounds(RectCoord::from_corners(0.0, 0.0, 0.0, 1.0));
        assert!(matches!(empty.validate(), Err(ConfigError::Invalid(_))));
        let inverted = GridLayerConfig::default().with_zoom_levels(5, 2);
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_serde_defaults_fill_missing_fields() {
        let config: GridLayerConfig =
            serde_json::from_str(r#"{"layer_name": "terrain", "max_zoom_level": 4}"#).unwrap();
        assert_eq!(config.layer_name, "terrain");
        assert_eq!(config.max_zoom_level, 4);
        assert_eq!(config.url_template, DEFAULT_URL_TEMPLATE);
    }
}
