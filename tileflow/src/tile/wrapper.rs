//! Decoded tiles as held by a source.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Opaque renderer state attached to a tile (GPU buffers, textures, ...).
pub type RenderState = Arc<dyn Any + Send + Sync>;

/// Where a tile is in its render lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileState {
    /// Decoded, waiting for the renderer to finish setup.
    InSetup,
    /// Set up and part of the desired set.
    Visible,
    /// No longer desired; kept while replacement tiles load.
    Cached,
}

/// A decoded tile result plus its render-side state.
pub struct TileWrapper<R> {
    result: Arc<R>,
    version: u64,
    render_state: Option<RenderState>,
    state: TileState,
    tessellation_factor: i32,
}

impl<R> TileWrapper<R> {
    pub fn new(result: R, version: u64, tessellation_factor: i32) -> Self {
        Self {
            result: Arc::new(result),
            version,
            render_state: None,
            state: TileState::InSetup,
            tessellation_factor,
        }
    }

    pub fn result(&self) -> &Arc<R> {
        &self.result
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn state(&self) -> TileState {
        self.state
    }

    pub fn set_state(&mut self, state: TileState) {
        self.state = state;
    }

    /// True once the renderer has finished setup.
    pub fn is_ready(&self) -> bool {
        self.state != TileState::InSetup
    }

    pub fn tessellation_factor(&self) -> i32 {
        self.tessellation_factor
    }

    pub fn render_state(&self) -> Option<&RenderState> {
        self.render_state.as_ref()
    }

    pub fn set_render_state(&mut self, render_state: RenderState) {
        self.render_state = Some(render_state);
    }

    /// Drops the render state and returns the tile to [`TileState::InSetup`].
    pub fn release_render_state(&mut self) -> Option<RenderState> {
        self.state = TileState::InSetup;
        self.render_state.take()
    }
}

impl<R> fmt::Debug for TileWrapper<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileWrapper")
            .field("version", &self.version)
            .field("state", &self.state)
            .field("has_render_state", &self.render_state.is_some())
            .field("tessellation_factor", &self.tessellation_factor)
            .finish()
    }
}
