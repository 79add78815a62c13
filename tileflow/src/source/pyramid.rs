//! Desired tile set computation.
//!
//! Given the visible rectangle, a time step and a camera zoom (scale
//! denominator), picks a target zoom level and enumerates the tiles of that
//! level, plus `num_draw_previous_layers` coarser levels, that intersect the
//! visible rectangle. Each tile gets a priority: tiles near the viewport
//! center and on the target level load first.

use crate::tile::{PrioritizedTileInfo, RectCoord, TileInfo, ZoomInfo, ZoomLevelInfo};

/// Number of distance buckets per level when computing priorities.
pub const PRIORITY_DISTANCE_BUCKETS: i32 = 20;

/// How far past the coarsest level the camera may zoom out before underzoom
/// applies, as a scale ratio.
pub const UNDERZOOM_TOLERANCE: f64 = 2.0;

/// How far past the finest level the camera may zoom in before overzoom
/// applies, as a scale ratio.
pub const OVERZOOM_TOLERANCE: f64 = 2.0;

/// Inputs for [`desired_tiles`].
#[derive(Clone, Debug)]
pub struct PyramidQuery<'a> {
    pub visible_bounds: RectCoord,
    pub t: i32,
    pub zoom: f64,
    /// Levels sorted coarse to fine.
    pub levels: &'a [ZoomLevelInfo],
    pub zoom_info: &'a ZoomInfo,
    pub min_zoom_level_identifier: Option<i32>,
    pub max_zoom_level_identifier: Option<i32>,
}

impl PyramidQuery<'_> {
    fn allows(&self, level: &ZoomLevelInfo) -> bool {
        let id = level.zoom_level_identifier;
        self.min_zoom_level_identifier.map_or(true, |min| id >= min)
            && self.max_zoom_level_identifier.map_or(true, |max| id <= max)
    }
}

/// Index of the level to draw at `query.zoom`, or `None` if nothing should
/// be drawn.
///
/// The target is the first level (coarse to fine) whose scaled zoom is finer
/// than the camera. A camera zoomed out well past the coarsest level only
/// gets tiles with underzoom; one zoomed in well past the finest level only
/// with overzoom. The result is then clamped into the configured identifier
/// range under the same flags.
pub fn target_level(query: &PyramidQuery<'_>) -> Option<usize> {
    let levels = query.levels;
    let info = query.zoom_info;
    let first = levels.first()?;
    let last = levels.last()?;
    let scaled = |level: &ZoomLevelInfo| level.zoom * info.zoom_level_scale_factor;

    if query.zoom > scaled(first) * UNDERZOOM_TOLERANCE && !info.underzoom {
        return None;
    }

    let mut target = match levels.iter().position(|level| scaled(level) < query.zoom) {
        Some(index) => index,
        None => {
            if query.zoom < scaled(last) / OVERZOOM_TOLERANCE && !info.overzoom {
                return None;
            }
            levels.len() - 1
        }
    };

    if let Some(max) = query.max_zoom_level_identifier {
        if levels[target].zoom_level_identifier > max {
            if !info.overzoom {
                return None;
            }
            target = levels.iter().rposition(|level| level.zoom_level_identifier <= max)?;
        }
    }
    if let Some(min) = query.min_zoom_level_identifier {
        if levels[target].zoom_level_identifier < min {
            if !info.underzoom {
                return None;
            }
            target = levels.iter().position(|level| level.zoom_level_identifier >= min)?;
        }
    }
    Some(target)
}

/// Tile index range `[start, end]` along one axis, or `None` if empty.
fn axis_range(
    origin: f64,
    grows_positive: bool,
    lo: f64,
    hi: f64,
    tile_width: f64,
    count: i32,
) -> Option<(i32, i32)> {
    let offset = |v: f64| if grows_positive { v - origin } else { origin - v };
    let (a, b) = (offset(lo), offset(hi));
    let (near, far) = (a.min(b), a.max(b));
    if far <= 0.0 || count <= 0 {
        return None;
    }
    let start = (near.max(0.0) / tile_width).floor() as i32;
    let end = ((far / tile_width).ceil() as i32 - 1).min(count - 1);
    (start <= end).then_some((start, end))
}

/// Tiles of one level intersecting `visible`, with their center distances.
fn level_tiles(
    level: &ZoomLevelInfo,
    level_index: usize,
    visible: &RectCoord,
    t: i32,
) -> Vec<(TileInfo, f64)> {
    let bounds = level.bounds;
    let width = level.tile_width_layer_system_units;
    if width <= 0.0 {
        return Vec::new();
    }
    let left_to_right = bounds.top_left.x <= bounds.bottom_right.x;
    let top_to_bottom = bounds.top_left.y <= bounds.bottom_right.y;

    let Some((x_start, x_end)) = axis_range(
        bounds.top_left.x,
        left_to_right,
        visible.min_x(),
        visible.max_x(),
        width,
        level.num_tiles_x,
    ) else {
        return Vec::new();
    };
    let Some((y_start, y_end)) = axis_range(
        bounds.top_left.y,
        top_to_bottom,
        visible.min_y(),
        visible.max_y(),
        width,
        level.num_tiles_y,
    ) else {
        return Vec::new();
    };

    let x_sign = if left_to_right { 1.0 } else { -1.0 };
    let y_sign = if top_to_bottom { 1.0 } else { -1.0 };
    let center = visible.center();

    let mut tiles = Vec::with_capacity(((x_end - x_start + 1) * (y_end - y_start + 1)) as usize);
    for x in x_start..=x_end {
        for y in y_start..=y_end {
            let left = bounds.top_left.x + x as f64 * width * x_sign;
            let top = bounds.top_left.y + y as f64 * width * y_sign;
            let rect =
                RectCoord::from_corners(left, top, left + width * x_sign, top + width * y_sign);
            if !rect.intersects(visible) {
                continue;
            }
            let zoom_identifier = level.zoom_level_identifier;
            let tile = TileInfo::new(rect, x, y, t, zoom_identifier, level_index as i32);
            tiles.push((tile, rect.center().distance(&center)));
        }
    }
    tiles
}

/// Computes the desired tile set for a view, sorted by ascending priority.
pub fn desired_tiles(query: &PyramidQuery<'_>) -> Vec<PrioritizedTileInfo> {
    let Some(target) = target_level(query) else {
        return Vec::new();
    };
    let previous = query.zoom_info.num_draw_previous_layers.max(0) as usize;
    let start = target.saturating_sub(previous);

    let mut desired = Vec::new();
    // Target level first (zoom_index 0), then progressively coarser levels.
    for (zoom_index, level_index) in (start..=target).rev().enumerate() {
        let level = &query.levels[level_index];
        if !query.allows(level) && level_index != target {
            continue;
        }
        let tiles = level_tiles(level, level_index, &query.visible_bounds, query.t);
        let max_distance = tiles.iter().map(|(_, d)| *d).fold(0.0_f64, f64::max);
        for (tile, distance) in tiles {
            let bucket = if max_distance > 0.0 {
                (distance / max_distance * PRIORITY_DISTANCE_BUCKETS as f64).ceil() as i32
            } else {
                0
            };
            let priority = bucket + zoom_index as i32 * PRIORITY_DISTANCE_BUCKETS;
            desired.push(PrioritizedTileInfo::new(tile, priority));
        }
    }
    desired.sort();
    desired
}
