//! Tile identity.
//!
//! A [`TileInfo`] names one tile of one zoom level at one time step. Equality
//! and hashing cover the zoom identifier, the `(x, y, t)` indices and the
//! exact bounds. Ordering is total (coarser zoom identifiers first) so tiles
//! can key ordered maps.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::coord::RectCoord;

/// Default tessellation factor for flat tiles.
pub const DEFAULT_TESSELLATION_FACTOR: i32 = 0;

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TileInfo {
    pub bounds: RectCoord,
    pub x: i32,
    pub y: i32,
    pub t: i32,
    /// Identifier of the zoom level, as used in tile URLs.
    pub zoom_identifier: i32,
    /// Index of the zoom level in the layer's level list.
    pub zoom_level: i32,
    /// Subdivision hint for renderers drawing the tile on a curved surface.
    pub tessellation_factor: i32,
}

impl TileInfo {
    pub fn new(
        bounds: RectCoord,
        x: i32,
        y: i32,
        t: i32,
        zoom_identifier: i32,
        zoom_level: i32,
    ) -> Self {
        Self {
            bounds,
            x,
            y,
            t,
            zoom_identifier,
            zoom_level,
            tessellation_factor: DEFAULT_TESSELLATION_FACTOR,
        }
    }

    pub fn with_tessellation_factor(mut self, factor: i32) -> Self {
        self.tessellation_factor = factor;
        self
    }

    fn key(&self) -> (i32, i32, i32, i32) {
        (self.zoom_identifier, self.x, self.y, self.t)
    }
}

impl PartialEq for TileInfo {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key() && self.bounds.to_bits() == other.bounds.to_bits()
    }
}

impl Eq for TileInfo {}

impl Hash for TileInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
        self.bounds.to_bits().hash(state);
    }
}

impl PartialOrd for TileInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TileInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key()
            .cmp(&other.key())
            .then_with(|| self.bounds.total_cmp(&other.bounds))
    }
}

impl fmt::Display for TileInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}@{}", self.zoom_identifier, self.x, self.y, self.t)
    }
}

/// A tile together with the load version that produced (or will produce) it.
///
/// Versions are issued per source and increase monotonically; a result is
/// only accepted if its version is the one currently registered for the
/// tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionedTileInfo {
    pub tile: TileInfo,
    pub version: u64,
}

impl VersionedTileInfo {
    pub fn new(tile: TileInfo, version: u64) -> Self {
        Self { tile, version }
    }
}

impl fmt::Display for VersionedTileInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.tile, self.version)
    }
}

/// A tile with its load priority. Lower values load first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrioritizedTileInfo {
    pub tile: TileInfo,
    pub priority: i32,
}

impl PrioritizedTileInfo {
    pub fn new(tile: TileInfo, priority: i32) -> Self {
        Self { tile, priority }
    }
}

impl PartialOrd for PrioritizedTileInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PrioritizedTileInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| self.tile.cmp(&other.tile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn tile(x: i32, y: i32, zoom: i32) -> TileInfo {
        let size = 1.0;
        TileInfo::new(
            RectCoord::from_corners(
                x as f64 * size,
                y as f64 * size,
                (x + 1) as f64 * size,
                (y + 1) as f64 * size,
            ),
            x,
            y,
            0,
            zoom,
            zoom,
        )
    }

    #[test]
    fn test_equality_ignores_tessellation() {
        let a = tile(1, 2, 3);
        let b = a.with_tessellation_factor(4);
        assert_eq!(a, b);
        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_equality_includes_bounds() {
        let a = tile(0, 0, 1);
        let mut b = a;
        b.bounds.bottom_right.x += 0.5;
        assert_ne!(a, b);
    }

    #[test]
    fn test_ordering_is_coarse_first() {
        let mut tiles = vec![tile(0, 0, 2), tile(1, 0, 1), tile(0, 0, 1)];
        tiles.sort();
        assert_eq!(tiles, vec![tile(0, 0, 1), tile(1, 0, 1), tile(0, 0, 2)]);
    }

    #[test]
    fn test_prioritized_orders_by_priority_first() {
        let near = PrioritizedTileInfo::new(tile(5, 5, 3), 1);
        let far = PrioritizedTileInfo::new(tile(0, 0, 3), 7);
        assert!(near < far);
    }

    #[test]
    fn test_display() {
        assert_eq!(tile(3, 4, 5).to_string(), "5/3/4@0");
        assert_eq!(VersionedTileInfo::new(tile(3, 4, 5), 9).to_string(), "5/3/4@0 v9");
    }
}
