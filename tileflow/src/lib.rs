//! Tileflow - tile lifecycle management for map renderers
//!
//! This library keeps the tiles of a map layer in step with a moving camera:
//! it works out which pyramid tiles a view needs, fetches them through an
//! ordered chain of loaders, decodes them off the render thread and tells
//! the renderer what changed. All mutable state lives behind actor
//! mailboxes driven by a pluggable scheduler.
//!
//! # High-Level API
//!
//! ```ignore
//! use tileflow::config::GridLayerConfig;
//! use tileflow::loader::FileLoader;
//! use tileflow::scheduler::ThreadPoolScheduler;
//! use tileflow::source::{BytesDecoder, TiledSource};
//!
//! let scheduler = Arc::new(ThreadPoolScheduler::with_defaults()?);
//! let layer = Arc::new(GridLayerConfig::default());
//! let source = TiledSource::builder(layer, Arc::new(BytesDecoder), scheduler.clone())
//!     .loader(Arc::new(FileLoader::new("tiles")?))
//!     .build();
//!
//! source.on_visible_bounds_changed(bounds, 0, camera_zoom);
//!
//! // Once per frame, on the render thread:
//! scheduler.run_graphics_tasks();
//! ```

pub mod actor;
pub mod config;
pub mod error;
pub mod error_manager;
pub mod loader;
pub mod logging;
pub mod scheduler;
pub mod source;
pub mod telemetry;
pub mod tile;

/// Version of the Tileflow library and CLI.
///
/// This is synchronized across all components in the workspace.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
