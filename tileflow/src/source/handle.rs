//! Public handle to a tiled source.
//!
//! A [`TiledSource`] is cheap to clone. Commands (`on_visible_bounds_changed`,
//! `force_reload`, `pause`, ...) are queued on the source's mailbox and
//! return immediately; queries either read under the mailbox's receive lock
//! (`is_ready_to_render_offscreen`) or are asked as a message
//! (`current_tiles`).
//!
//! # Example
//!
//! ```ignore
//! use tileflow::source::{BytesDecoder, TiledSource};
//!
//! let source = TiledSource::builder(layer, Arc::new(BytesDecoder), scheduler)
//!     .loader(Arc::new(FileLoader::new("tiles")?))
//!     .config(SourceConfig::default())
//!     .error_manager(errors)
//!     .listener(&listener)
//!     .build();
//!
//! source.on_visible_bounds_changed(bounds, 0, camera_zoom);
//! ```
//!
//! # Listener re-entrancy
//!
//! Listeners are called from the source's graphics messages. A listener
//! must not call [`TiledSource::is_ready_to_render_offscreen`] or block on a
//! [`Reply`] from the same source inside `on_tiles_updated`; queue the
//! follow-up instead.

use std::sync::{Arc, Weak};

use super::decoder::TileDecoder;
use super::listener::{LayerReadyState, TileSnapshot, TilesListener};
use super::state::{SourceCore, SourceParts, View};
use crate::actor::{Actor, DuplicationStrategy, Mailbox, Reply};
use crate::config::{LayerConfig, SourceConfig};
use crate::error::MailboxError;
use crate::error_manager::ErrorManager;
use crate::loader::{Loader, LoaderChain};
use crate::scheduler::{ExecutionEnvironment, Scheduler};
use crate::telemetry::SourceMetrics;
use crate::tile::{PrioritizedTileInfo, RectCoord, RenderState, TileInfo, VersionedTileInfo};

/// Builder for [`TiledSource`].
pub struct TiledSourceBuilder<D: TileDecoder> {
    // Required components
    layer_config: Arc<dyn LayerConfig>,
    decoder: Arc<D>,
    scheduler: Arc<dyn Scheduler>,

    name: Option<String>,
    loaders: Vec<Arc<dyn Loader>>,
    config: SourceConfig,
    error_manager: Option<Arc<dyn ErrorManager>>,
    listeners: Vec<Weak<dyn TilesListener<D::Output>>>,
    metrics: Option<Arc<SourceMetrics>>,
}

impl<D: TileDecoder> TiledSourceBuilder<D> {
    /// Source name used in logs and notifications. Defaults to the layer
    /// name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Appends a loader to the fallback chain.
    pub fn loader(mut self, loader: Arc<dyn Loader>) -> Self {
        self.loaders.push(loader);
        self
    }

    pub fn loaders(mut self, loaders: impl IntoIterator<Item = Arc<dyn Loader>>) -> Self {
        self.loaders.extend(loaders);
        self
    }

    pub fn config(mut self, config: SourceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn error_manager(mut self, manager: Arc<dyn ErrorManager>) -> Self {
        self.error_manager = Some(manager);
        self
    }

    /// Registers a listener. Only a weak reference is kept.
    pub fn listener<L>(mut self, listener: &Arc<L>) -> Self
    where
        L: TilesListener<D::Output> + 'static,
    {
        self.listeners.push(downgrade_listener(listener));
        self
    }

    /// Shares a metrics collector, e.g. across several sources.
    pub fn metrics(mut self, metrics: Arc<SourceMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> TiledSource<D> {
        let name = self
            .name
            .unwrap_or_else(|| self.layer_config.layer_name().to_string());
        let metrics = self.metrics.unwrap_or_else(|| Arc::new(SourceMetrics::new()));
        let mailbox =
            Mailbox::with_capacity(Arc::clone(&self.scheduler), self.config.mailbox_capacity);

        let core = SourceCore::new(SourceParts {
            name: name.clone(),
            layer_config: self.layer_config,
            config: self.config,
            loaders: LoaderChain::new(self.loaders),
            decoder: self.decoder,
            scheduler: self.scheduler,
            error_manager: self.error_manager,
            listeners: self.listeners,
            metrics: Arc::clone(&metrics),
        });
        let actor = Actor::new(mailbox, core);
        let weak = actor.downgrade();
        actor.sync_access(|core| core.attach(weak));

        tracing::debug!(source = %name, "Tiled source created");
        TiledSource { actor, metrics, name }
    }
}

fn downgrade_listener<R, L>(listener: &Arc<L>) -> Weak<dyn TilesListener<R>>
where
    R: 'static,
    L: TilesListener<R> + 'static,
{
    let listener: Arc<dyn TilesListener<R>> = listener.clone();
    Arc::downgrade(&listener)
}

/// Keeps the tiles of one layer in step with the camera.
pub struct TiledSource<D: TileDecoder> {
    actor: Actor<SourceCore<D>>,
    metrics: Arc<SourceMetrics>,
    name: String,
}

impl<D: TileDecoder> TiledSource<D> {
    pub fn builder(
        layer_config: Arc<dyn LayerConfig>,
        decoder: Arc<D>,
        scheduler: Arc<dyn Scheduler>,
    ) -> TiledSourceBuilder<D> {
        TiledSourceBuilder {
            layer_config,
            decoder,
            scheduler,
            name: None,
            loaders: Vec::new(),
            config: SourceConfig::default(),
            error_manager: None,
            listeners: Vec::new(),
            metrics: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<SourceMetrics> {
        &self.metrics
    }

    pub fn mailbox(&self) -> &Arc<Mailbox> {
        self.actor.mailbox()
    }

    // === Commands ===

    /// Recomputes the desired tile set for a new view and loads what is
    /// missing. Every call is processed.
    pub fn on_visible_bounds_changed(&self, bounds: RectCoord, t: i32, zoom: f64) {
        self.actor.send("on_visible_bounds_changed", move |source| {
            source.on_visible_bounds_changed(bounds, t, zoom)
        });
    }

    /// Like [`on_visible_bounds_changed`](Self::on_visible_bounds_changed),
    /// but replaces a view update still waiting in the queue.
    pub fn on_visible_bounds_changed_coalesced(
        &self,
        bounds: RectCoord,
        t: i32,
        zoom: f64,
    ) -> Result<(), MailboxError> {
        self.actor.message(
            ExecutionEnvironment::Computation,
            DuplicationStrategy::ReplaceNewest,
            "on_visible_bounds_changed",
            move |source| source.on_visible_bounds_changed(bounds, t, zoom),
        )
    }

    /// Reloads every desired tile under new versions. Loaded tiles stay
    /// drawable as outdated tiles until their replacements arrive.
    pub fn force_reload(&self) {
        self.actor.send("force_reload", |source| source.force_reload());
    }

    pub fn pause(&self) {
        self.actor.send("pause", |source| source.pause());
    }

    pub fn resume(&self) {
        self.actor.send("resume", |source| source.resume());
    }

    /// Takes effect on the next bounds change.
    pub fn set_min_zoom_level_identifier(&self, identifier: Option<i32>) {
        self.actor.send("set_min_zoom_level_identifier", move |source| {
            source.set_min_zoom_level_identifier(identifier)
        });
    }

    /// Takes effect on the next bounds change.
    pub fn set_max_zoom_level_identifier(&self, identifier: Option<i32>) {
        self.actor.send("set_max_zoom_level_identifier", move |source| {
            source.set_max_zoom_level_identifier(identifier)
        });
    }

    /// Abandons the load of `tile`, asking loader `loader_index` (or every
    /// loader) to cancel its request.
    pub fn cancel_load(&self, tile: TileInfo, loader_index: Option<usize>) {
        self.actor.send("cancel_load", move |source| {
            source.cancel_load(&tile, loader_index);
        });
    }

    pub fn set_error_manager(&self, manager: Option<Arc<dyn ErrorManager>>) {
        self.actor
            .send("set_error_manager", move |source| source.set_error_manager(manager));
    }

    pub fn add_listener<L>(&self, listener: &Arc<L>)
    where
        L: TilesListener<D::Output> + 'static,
    {
        let weak = downgrade_listener(listener);
        self.actor.send("add_listener", move |source| source.add_listener(weak));
    }

    // === Renderer callbacks ===

    /// Marks a tile's render setup as finished. Ignored for stale versions.
    pub fn set_tile_ready(&self, tile: VersionedTileInfo) {
        self.actor.send("set_tile_ready", move |source| {
            source.set_tile_ready(tile);
        });
    }

    pub fn set_tiles_ready(&self, tiles: Vec<VersionedTileInfo>) {
        self.actor.send("set_tiles_ready", move |source| {
            for tile in tiles {
                source.set_tile_ready(tile);
            }
        });
    }

    /// Attaches renderer state to a tile. Released on pause and eviction.
    pub fn set_render_state(&self, tile: VersionedTileInfo, render_state: RenderState) {
        self.actor.send("set_render_state", move |source| {
            source.set_render_state(tile, render_state);
        });
    }

    // === Queries ===

    pub fn is_ready_to_render_offscreen(&self) -> LayerReadyState {
        self.actor.sync_access(|source| source.ready_state())
    }

    /// Whether `tile` belongs to the last computed desired set.
    pub fn is_tile_visible(&self, tile: &TileInfo) -> bool {
        self.actor.sync_access(|source| source.is_tile_visible(tile))
    }

    pub fn is_paused(&self) -> bool {
        self.actor.sync_access(|source| source.is_paused())
    }

    pub fn view(&self) -> Option<View> {
        self.actor.sync_access(|source| source.view())
    }

    pub fn zoom_level_identifier_range(&self) -> (Option<i32>, Option<i32>) {
        self.actor.sync_access(|source| {
            (
                source.min_zoom_level_identifier(),
                source.max_zoom_level_identifier(),
            )
        })
    }

    pub fn desired_tiles(&self) -> Vec<PrioritizedTileInfo> {
        self.actor.sync_access(|source| source.desired_tiles())
    }

    pub fn loading_count(&self) -> usize {
        self.actor.sync_access(|source| source.loading_count())
    }

    /// URLs of tiles whose failure is currently reported.
    pub fn error_urls(&self) -> Vec<String> {
        self.actor.sync_access(|source| source.error_urls())
    }

    /// Snapshot of the published tiles, taken in order with queued commands.
    pub fn current_tiles(&self) -> Reply<TileSnapshot<D::Output>> {
        self.actor
            .ask(ExecutionEnvironment::Computation, "current_tiles", |source| source.snapshot())
    }
}

impl<D: TileDecoder> Clone for TiledSource<D> {
    fn clone(&self) -> Self {
        Self {
            actor: self.actor.clone(),
            metrics: Arc::clone(&self.metrics),
            name: self.name.clone(),
        }
    }
}

impl<D: TileDecoder> std::fmt::Debug for TiledSource<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiledSource").field("name", &self.name).finish()
    }
}
