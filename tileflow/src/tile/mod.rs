//! Tile identity, pyramid geometry and decoded tile wrappers.

mod coord;
mod info;
mod wrapper;
pub mod zoom;

pub use coord::{Coord, RectCoord};
pub use info::{PrioritizedTileInfo, TileInfo, VersionedTileInfo, DEFAULT_TESSELLATION_FACTOR};
pub use wrapper::{RenderState, TileState, TileWrapper};
pub use zoom::{ZoomInfo, ZoomLevelInfo};
