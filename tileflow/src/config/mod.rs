//! Configuration types.
//!
//! - [`LayerConfig`]: the pyramid layout of a layer (trait, with
//!   [`GridLayerConfig`] as the stock implementation)
//! - [`SourceConfig`]: runtime settings of one source
//! - [`ConfigFile`]: both, loaded from JSON

mod file;
mod layer;
mod source;

pub use file::{load_layer_config, ConfigFile};
pub use layer::{
    GridLayerConfig, LayerConfig, DEFAULT_LAYER_NAME, DEFAULT_MAX_ZOOM_LEVEL, DEFAULT_URL_TEMPLATE,
    WEB_MERCATOR_BASE_ZOOM, WEB_MERCATOR_HALF_EXTENT,
};
pub use source::{SourceConfig, DEFAULT_OUTDATED_TILE_TIMEOUT_MS};
