//! Tile update notifications.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::tile::{TileInfo, TileState, VersionedTileInfo};

/// One published tile.
pub struct TileEntry<R> {
    pub tile: VersionedTileInfo,
    pub result: Arc<R>,
    pub state: TileState,
    pub tessellation_factor: i32,
}

impl<R> Clone for TileEntry<R> {
    fn clone(&self) -> Self {
        Self {
            tile: self.tile,
            result: Arc::clone(&self.result),
            state: self.state,
            tessellation_factor: self.tessellation_factor,
        }
    }
}

impl<R> std::fmt::Debug for TileEntry<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileEntry")
            .field("tile", &self.tile)
            .field("state", &self.state)
            .finish()
    }
}

/// The tiles a source currently publishes.
///
/// `current` holds tiles of the desired set; `outdated` holds tiles that
/// left the desired set but stay drawable until their replacements load.
pub struct TileSnapshot<R> {
    pub current: Vec<TileEntry<R>>,
    pub outdated: Vec<TileEntry<R>>,
}

impl<R> TileSnapshot<R> {
    pub fn empty() -> Self {
        Self {
            current: Vec::new(),
            outdated: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.current.len() + self.outdated.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty() && self.outdated.is_empty()
    }

    /// The current tile entry for `tile`, if published.
    pub fn current_entry(&self, tile: &TileInfo) -> Option<&TileEntry<R>> {
        self.current.iter().find(|entry| entry.tile.tile == *tile)
    }

    pub fn current_tiles(&self) -> impl Iterator<Item = &TileInfo> {
        self.current.iter().map(|entry| &entry.tile.tile)
    }
}

impl<R> Clone for TileSnapshot<R> {
    fn clone(&self) -> Self {
        Self {
            current: self.current.clone(),
            outdated: self.outdated.clone(),
        }
    }
}

impl<R> std::fmt::Debug for TileSnapshot<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileSnapshot")
            .field("current", &self.current.len())
            .field("outdated", &self.outdated.len())
            .finish()
    }
}

/// Receives tile set updates from a source.
///
/// Called on the graphics environment. Listeners are held weakly; drop the
/// listener to unsubscribe.
pub trait TilesListener<R>: Send + Sync {
    fn on_tiles_updated(&self, source_name: &str, snapshot: TileSnapshot<R>);
}

/// Whether a source can produce a complete offscreen frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerReadyState {
    /// No view yet, or some desired tile is still missing.
    NotReady,
    /// Every desired tile is in the current tiles (or has no content).
    Ready,
    /// A desired tile failed with a non-recoverable status.
    Error,
}
