//! Tiled sources.
//!
//! A [`TiledSource`] turns camera updates into a desired tile set, loads
//! missing tiles through a [`LoaderChain`](crate::loader::LoaderChain),
//! decodes them with a [`TileDecoder`] and publishes the result to
//! [`TilesListener`]s.
//!
//! # Architecture
//!
//! ```text
//! on_visible_bounds_changed ──► pyramid::desired_tiles
//!                                      │
//!                        ┌─────────────┴─────────────┐
//!                        ▼                           ▼
//!                 missing tiles               tiles that left
//!                        │                           │
//!              load task (computation)        outdated map ──► evicted
//!                        │
//!              decode (inline or task)
//!                        │
//!                 current map ──► notify_tiles_updated (graphics, coalesced)
//! ```
//!
//! All source state lives behind the source's mailbox; loads and decodes run
//! as scheduler tasks and report back through messages.

mod decoder;
mod handle;
mod listener;
pub mod pyramid;
mod state;

pub use decoder::{BytesDecoder, CancelProbe, TileDecoder};
pub use handle::{TiledSource, TiledSourceBuilder};
pub use listener::{LayerReadyState, TileEntry, TileSnapshot, TilesListener};
pub use pyramid::{desired_tiles, PyramidQuery};
pub use state::{View, DECODE_TASK_NAME, EVICT_TASK_NAME, LOAD_TASK_NAME};
