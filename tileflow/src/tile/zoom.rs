//! Zoom level descriptions and scale/identifier conversion.
//!
//! Zoom is expressed as a scale denominator: larger values are coarser.
//! Level lists are handled sorted coarse to fine (descending `zoom`).

use serde::{Deserialize, Serialize};

use super::coord::RectCoord;

/// Default multiplier applied to level scales when choosing a target level.
pub const DEFAULT_ZOOM_LEVEL_SCALE_FACTOR: f64 = 1.0;

/// Default number of coarser levels requested below the target level.
pub const DEFAULT_NUM_DRAW_PREVIOUS_LAYERS: i32 = 0;

/// Describes one level of a tile pyramid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZoomLevelInfo {
    /// Scale denominator at which this level is drawn 1:1.
    pub zoom: f64,
    /// Edge length of one tile in layer system units.
    pub tile_width_layer_system_units: f64,
    pub num_tiles_x: i32,
    pub num_tiles_y: i32,
    /// Number of time steps; `1` for static layers.
    pub num_tiles_t: i32,
    pub zoom_level_identifier: i32,
    /// Extent of the level; `top_left` is the origin of tile `(0, 0)`.
    pub bounds: RectCoord,
}

/// Target-level selection settings for a layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomInfo {
    pub zoom_level_scale_factor: f64,
    pub num_draw_previous_layers: i32,
    /// Show the coarsest level even when the camera is zoomed out past it.
    pub underzoom: bool,
    /// Show the finest level even when the camera is zoomed in past it.
    pub overzoom: bool,
}

impl Default for ZoomInfo {
    fn default() -> Self {
        Self {
            zoom_level_scale_factor: DEFAULT_ZOOM_LEVEL_SCALE_FACTOR,
            num_draw_previous_layers: DEFAULT_NUM_DRAW_PREVIOUS_LAYERS,
            underzoom: true,
            overzoom: true,
        }
    }
}

/// Sorts levels coarse to fine.
pub fn sort_coarse_to_fine(levels: &mut [ZoomLevelInfo]) {
    levels.sort_by(|a, b| b.zoom.total_cmp(&a.zoom));
}

/// Returns the zoom identifier shown at scale `zoom`.
///
/// Between two levels the identifier is interpolated linearly in scale and
/// rounded down, so the result is the coarser of the two unless `zoom`
/// reaches the finer level exactly. Outside the pyramid the nearest end
/// identifier is returned. `levels` must be sorted coarse to fine.
pub fn zoom_identifier_for(levels: &[ZoomLevelInfo], zoom: f64) -> i32 {
    let (Some(first), Some(last)) = (levels.first(), levels.last()) else {
        return 0;
    };
    if zoom >= first.zoom {
        return first.zoom_level_identifier;
    }
    if zoom <= last.zoom {
        return last.zoom_level_identifier;
    }
    for pair in levels.windows(2) {
        let (coarse, fine) = (&pair[0], &pair[1]);
        if zoom <= coarse.zoom && zoom > fine.zoom {
            let fraction = (coarse.zoom - zoom) / (coarse.zoom - fine.zoom);
            let span = (fine.zoom_level_identifier - coarse.zoom_level_identifier) as f64;
            return coarse.zoom_level_identifier + (fraction * span).floor() as i32;
        }
    }
    last.zoom_level_identifier
}

/// Returns the scale at which `identifier` is shown.
///
/// Fractional identifiers interpolate linearly between levels; identifiers
/// outside the pyramid clamp to the nearest end. Inverse of
/// [`zoom_identifier_for`] at level boundaries.
pub fn zoom_factor_at_identifier(levels: &[ZoomLevelInfo], identifier: f64) -> f64 {
    let (Some(first), Some(last)) = (levels.first(), levels.last()) else {
        return 0.0;
    };
    if identifier <= first.zoom_level_identifier as f64 {
        return first.zoom;
    }
    if identifier >= last.zoom_level_identifier as f64 {
        return last.zoom;
    }
    for pair in levels.windows(2) {
        let (coarse, fine) = (&pair[0], &pair[1]);
        let (lo, hi) = (coarse.zoom_level_identifier as f64, fine.zoom_level_identifier as f64);
        if identifier >= lo && identifier <= hi {
            let fraction = if hi > lo { (identifier - lo) / (hi - lo) } else { 0.0 };
            return coarse.zoom + (fine.zoom - coarse.zoom) * fraction;
        }
    }
    last.zoom
}
