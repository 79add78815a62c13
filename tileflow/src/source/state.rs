//! Source state and the messages that mutate it.
//!
//! [`SourceCore`] is the object behind a [`TiledSource`](super::TiledSource)'s
//! mailbox. Every method here runs inside a mailbox message (or under
//! `sync_access`), so the tile maps need no locking of their own. The one
//! exception is the loading map, which is shared with load and decode tasks
//! through [`CancelProbe`].
//!
//! # Tile lifecycle
//!
//! ```text
//! desired ──► loading ──► decoded ──► current ──► outdated ──► evicted
//!                │                                   ▲
//!                └──► failed (noop / error)           └── left desired set
//! ```
//!
//! Each issued load gets a fresh version. Results whose version no longer
//! matches the loading map are dropped without side effects.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Weak};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, error, info, trace, warn};

use super::decoder::{decode_guarded, CancelProbe, LoadingTiles, TileDecoder};
use super::listener::{LayerReadyState, TileEntry, TileSnapshot, TilesListener};
use super::pyramid::{self, PyramidQuery};
use crate::actor::{DuplicationStrategy, WeakActor};
use crate::config::{LayerConfig, SourceConfig};
use crate::error::DecodeError;
use crate::error_manager::{ErrorManager, TiledLayerError};
use crate::loader::{ChainOutcome, LoaderChain, LoaderStatus};
use crate::scheduler::{ExecutionEnvironment, Scheduler, Task, TaskConfig, TaskPriority};
use crate::telemetry::SourceMetrics;
use crate::tile::{
    PrioritizedTileInfo, RectCoord, RenderState, TileInfo, TileState, TileWrapper,
    VersionedTileInfo, ZoomInfo, ZoomLevelInfo,
};

/// Scheduler task name of tile fetches.
pub const LOAD_TASK_NAME: &str = "tile_load";
/// Scheduler task name of expensive decodes.
pub const DECODE_TASK_NAME: &str = "tile_decode";
/// Scheduler task name of outdated-tile eviction timers.
pub const EVICT_TASK_NAME: &str = "outdated_tile_eviction";

/// The last view passed to `on_visible_bounds_changed`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct View {
    pub bounds: RectCoord,
    pub t: i32,
    pub zoom: f64,
}

/// Why a desired tile has no entry in `current_tiles`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TileFailure {
    /// Every loader declined or the decoder produced nothing.
    Empty,
    Load(LoaderStatus),
    Decode,
}

/// A tile that left the desired set, tagged with its retirement batch.
struct Retired<R> {
    wrapper: TileWrapper<R>,
    generation: u64,
}

/// Everything a source needs at construction.
pub(crate) struct SourceParts<D: TileDecoder> {
    pub name: String,
    pub layer_config: Arc<dyn LayerConfig>,
    pub config: SourceConfig,
    pub loaders: LoaderChain,
    pub decoder: Arc<D>,
    pub scheduler: Arc<dyn Scheduler>,
    pub error_manager: Option<Arc<dyn ErrorManager>>,
    pub listeners: Vec<Weak<dyn TilesListener<D::Output>>>,
    pub metrics: Arc<SourceMetrics>,
}

pub(crate) struct SourceCore<D: TileDecoder> {
    name: String,
    layer_config: Arc<dyn LayerConfig>,
    levels: Vec<ZoomLevelInfo>,
    zoom_info: ZoomInfo,
    config: SourceConfig,
    loaders: LoaderChain,
    decoder: Arc<D>,
    scheduler: Arc<dyn Scheduler>,
    error_manager: Option<Arc<dyn ErrorManager>>,
    listeners: Vec<Weak<dyn TilesListener<D::Output>>>,
    metrics: Arc<SourceMetrics>,
    self_actor: WeakActor<SourceCore<D>>,

    min_zoom_level_identifier: Option<i32>,
    max_zoom_level_identifier: Option<i32>,
    paused: bool,
    view: Option<View>,

    desired: Vec<PrioritizedTileInfo>,
    desired_set: HashSet<TileInfo>,
    current_tiles: BTreeMap<TileInfo, TileWrapper<D::Output>>,
    outdated_tiles: BTreeMap<TileInfo, Retired<D::Output>>,
    loading_tiles: LoadingTiles,
    failed_tiles: HashMap<TileInfo, TileFailure>,
    /// Tiles with an error reported to the error manager, and its URL.
    error_tiles: HashMap<TileInfo, String>,

    next_version: u64,
    outdated_generation: u64,
}

impl<D: TileDecoder> SourceCore<D> {
    pub(crate) fn new(parts: SourceParts<D>) -> Self {
        let mut levels = parts.layer_config.zoom_level_infos();
        crate::tile::zoom::sort_coarse_to_fine(&mut levels);

        let zoom_info = parts.config.resolve_zoom_info(parts.layer_config.zoom_info());

        Self {
            name: parts.name,
            layer_config: parts.layer_config,
            levels,
            zoom_info,
            min_zoom_level_identifier: parts.config.min_zoom_level_identifier,
            max_zoom_level_identifier: parts.config.max_zoom_level_identifier,
            config: parts.config,
            loaders: parts.loaders,
            decoder: parts.decoder,
            scheduler: parts.scheduler,
            error_manager: parts.error_manager,
            listeners: parts.listeners,
            metrics: parts.metrics,
            self_actor: WeakActor::new(),
            paused: false,
            view: None,
            desired: Vec::new(),
            desired_set: HashSet::new(),
            current_tiles: BTreeMap::new(),
            outdated_tiles: BTreeMap::new(),
            loading_tiles: Arc::new(Mutex::new(HashMap::new())),
            failed_tiles: HashMap::new(),
            error_tiles: HashMap::new(),
            next_version: 1,
            outdated_generation: 0,
        }
    }

    pub(crate) fn attach(&mut self, actor: WeakActor<SourceCore<D>>) {
        self.self_actor = actor;
    }

    // =========================================================================
    // Desired set
    // =========================================================================

    pub(crate) fn on_visible_bounds_changed(&mut self, bounds: RectCoord, t: i32, zoom: f64) {
        let view = View { bounds, t, zoom };
        self.view = Some(view);
        let desired = pyramid::desired_tiles(&PyramidQuery {
            visible_bounds: bounds,
            t,
            zoom,
            levels: &self.levels,
            zoom_info: &self.zoom_info,
            min_zoom_level_identifier: self.min_zoom_level_identifier,
            max_zoom_level_identifier: self.max_zoom_level_identifier,
        });
        trace!(source = %self.name, tiles = desired.len(), zoom, "Desired set computed");
        self.apply_desired(desired);
    }

    fn apply_desired(&mut self, desired: Vec<PrioritizedTileInfo>) {
        let desired_set: HashSet<TileInfo> = desired.iter().map(|p| p.tile).collect();
        let mut changed = false;

        // Tiles scrolled back into view come back from the outdated map.
        let revived: Vec<TileInfo> = {
            let loading = self.loading_tiles.lock();
            self.outdated_tiles
                .keys()
                .filter(|tile| desired_set.contains(tile) && !loading.contains_key(tile))
                .copied()
                .collect()
        };
        for tile in revived {
            if let Some(Retired { mut wrapper, .. }) = self.outdated_tiles.remove(&tile) {
                let state = if wrapper.render_state().is_some() {
                    TileState::Visible
                } else {
                    TileState::InSetup
                };
                wrapper.set_state(state);
                self.current_tiles.insert(tile, wrapper);
                changed = true;
            }
        }

        let leaving: Vec<TileInfo> = self
            .current_tiles
            .keys()
            .filter(|tile| !desired_set.contains(tile))
            .copied()
            .collect();
        if !leaving.is_empty() {
            self.outdated_generation += 1;
            for tile in &leaving {
                if let Some(wrapper) = self.current_tiles.remove(tile) {
                    self.retire(*tile, wrapper);
                }
            }
            changed = true;
        }

        let stale: Vec<TileInfo> = self
            .loading_tiles
            .lock()
            .keys()
            .filter(|tile| !desired_set.contains(tile))
            .copied()
            .collect();
        for tile in stale {
            self.cancel_load(&tile, None);
        }

        self.failed_tiles.retain(|tile, _| desired_set.contains(tile));
        let left_with_errors: Vec<TileInfo> = self
            .error_tiles
            .keys()
            .filter(|tile| !desired_set.contains(tile))
            .copied()
            .collect();
        for tile in left_with_errors {
            self.clear_error(&tile);
        }

        self.desired = desired;
        self.desired_set = desired_set;

        if !self.paused {
            self.issue_missing_loads();
        }
        if !leaving.is_empty() {
            self.schedule_outdated_eviction(self.outdated_generation);
        }
        changed |= self.evict_outdated_if_settled();
        if changed {
            self.publish();
        }
    }

    fn retire(&mut self, tile: TileInfo, mut wrapper: TileWrapper<D::Output>) {
        wrapper.set_state(TileState::Cached);
        self.outdated_tiles.insert(
            tile,
            Retired {
                wrapper,
                generation: self.outdated_generation,
            },
        );
    }

    // =========================================================================
    // Loading
    // =========================================================================

    fn tile_url(&self, tile: &TileInfo) -> String {
        self.layer_config.tile_url(tile.x, tile.y, tile.t, tile.zoom_identifier)
    }

    fn is_current_load(&self, tile: &TileInfo, version: u64) -> bool {
        self.loading_tiles.lock().get(tile) == Some(&version)
    }

    /// Queues a load for every desired tile that is neither present, loading
    /// nor known to have failed. Runs in priority order.
    fn issue_missing_loads(&mut self) {
        let missing: Vec<TileInfo> = {
            let loading = self.loading_tiles.lock();
            self.desired
                .iter()
                .map(|p| p.tile)
                .filter(|tile| {
                    !self.current_tiles.contains_key(tile)
                        && !loading.contains_key(tile)
                        && !self.failed_tiles.contains_key(tile)
                })
                .collect()
        };

        for tile in missing {
            let version = self.next_version;
            self.next_version += 1;
            self.loading_tiles.lock().insert(tile, version);
            self.metrics.load_requested();
            debug!(source = %self.name, tile = %tile, version, "Requesting tile");

            let queued = self.self_actor.message(
                ExecutionEnvironment::Computation,
                DuplicationStrategy::None,
                "perform_loading_task",
                move |source| source.perform_loading_task(tile, version),
            );
            if let Err(error) = queued {
                warn!(source = %self.name, tile = %tile, %error, "Failed to queue tile load");
                self.loading_tiles.lock().remove(&tile);
                self.metrics.load_cancelled();
            }
        }
    }

    fn perform_loading_task(&mut self, tile: TileInfo, version: u64) {
        if !self.is_current_load(&tile, version) {
            return;
        }
        if self.paused {
            // Re-issued on resume.
            self.loading_tiles.lock().remove(&tile);
            self.metrics.load_cancelled();
            return;
        }

        let url = self.tile_url(&tile);
        let probe = CancelProbe::new(Arc::clone(&self.loading_tiles), tile, version);
        let loaders = self.loaders.clone();
        let actor = self.self_actor.clone();
        self.scheduler.add_task(Task::new(TaskConfig::new(LOAD_TASK_NAME), move || {
            if probe.is_cancelled() {
                trace!(tile = %tile, version, "Load cancelled before fetch");
                return;
            }
            let outcome = loaders.load_data(&url, None);
            actor.deliver("did_load", move |source| {
                source.did_load(tile, version, url, outcome)
            });
        }));
    }

    fn did_load(
        &mut self,
        tile: TileInfo,
        version: u64,
        url: String,
        outcome: ChainOutcome<Bytes>,
    ) {
        if !self.is_current_load(&tile, version) {
            trace!(tile = %tile, version, "Dropping stale load result");
            return;
        }

        match outcome.result.status {
            LoaderStatus::Ok => {
                self.metrics.load_succeeded();
                self.clear_error(&tile);
                match outcome.result.data {
                    Some(payload) => self.start_decode(tile, version, payload),
                    None => self.finish_failed(tile, TileFailure::Empty),
                }
            }
            LoaderStatus::Noop => {
                debug!(
                    source = %self.name,
                    tile = %tile,
                    url = %url,
                    "No loader provided the tile"
                );
                self.metrics.load_succeeded();
                self.finish_failed(tile, TileFailure::Empty);
            }
            status => {
                warn!(
                    source = %self.name,
                    tile = %tile,
                    url = %url,
                    status = ?status,
                    "Tile load failed"
                );
                self.metrics.load_failed();
                self.report_error(&tile, url, status, outcome.result.error_code);
                self.finish_failed(tile, TileFailure::Load(status));
            }
        }
    }

    fn start_decode(&mut self, tile: TileInfo, version: u64, payload: Bytes) {
        let probe = CancelProbe::new(Arc::clone(&self.loading_tiles), tile, version);

        if !self.decoder.has_expensive_post_loading_task() {
            let decoded = decode_guarded(self.decoder.as_ref(), payload, &tile, &probe);
            self.did_decode(tile, version, decoded);
            return;
        }

        let decoder = Arc::clone(&self.decoder);
        let metrics = Arc::clone(&self.metrics);
        let actor = self.self_actor.clone();
        self.scheduler.add_task(Task::new(TaskConfig::new(DECODE_TASK_NAME), move || {
            if probe.is_cancelled() {
                metrics.decode_discarded();
                return;
            }
            let decoded = decode_guarded(decoder.as_ref(), payload, &tile, &probe);
            actor.deliver("did_decode", move |source| {
                source.did_decode(tile, version, decoded)
            });
        }));
    }

    fn did_decode(
        &mut self,
        tile: TileInfo,
        version: u64,
        decoded: Result<Option<D::Output>, DecodeError>,
    ) {
        if !self.is_current_load(&tile, version) {
            debug!(
                source = %self.name,
                tile = %tile,
                version,
                "Discarding superseded decode"
            );
            self.metrics.decode_discarded();
            return;
        }

        match decoded {
            Ok(Some(result)) => {
                self.loading_tiles.lock().remove(&tile);
                self.metrics.decode_completed();
                self.outdated_tiles.remove(&tile);
                self.current_tiles
                    .insert(tile, TileWrapper::new(result, version, tile.tessellation_factor));
                debug!(source = %self.name, tile = %tile, version, "Tile ready");
                self.evict_outdated_if_settled();
                self.publish();
            }
            Ok(None) => {
                self.metrics.decode_completed();
                self.finish_failed(tile, TileFailure::Empty);
            }
            Err(decode_error) => {
                error!(
                    source = %self.name,
                    tile = %tile,
                    error = %decode_error,
                    "Tile decode failed"
                );
                self.metrics.decode_failed();
                let url = self.tile_url(&tile);
                let message = Some(decode_error.to_string());
                self.report_error(&tile, url, LoaderStatus::ErrorOther, message);
                self.finish_failed(tile, TileFailure::Decode);
            }
        }
    }

    fn finish_failed(&mut self, tile: TileInfo, failure: TileFailure) {
        self.loading_tiles.lock().remove(&tile);
        self.failed_tiles.insert(tile, failure);
        if self.evict_outdated_if_settled() {
            self.publish();
        }
    }

    /// Abandons the load of `tile`. Returns whether a load was in flight.
    pub(crate) fn cancel_load(&mut self, tile: &TileInfo, loader_index: Option<usize>) -> bool {
        if self.loading_tiles.lock().remove(tile).is_none() {
            return false;
        }
        let url = self.tile_url(tile);
        match loader_index {
            Some(index) => self.loaders.cancel(index, &url),
            None => self.loaders.cancel_all(&url),
        }
        self.metrics.load_cancelled();
        debug!(source = %self.name, tile = %tile, url = %url, "Load cancelled");
        true
    }

    // =========================================================================
    // Errors
    // =========================================================================

    fn report_error(
        &mut self,
        tile: &TileInfo,
        url: String,
        status: LoaderStatus,
        error_code: Option<String>,
    ) {
        if let Some(manager) = &self.error_manager {
            manager.add_tiled_layer_error(
                TiledLayerError::new(self.layer_config.layer_name(), url.clone(), status)
                    .with_error_code(error_code)
                    .with_bounds(tile.bounds),
            );
        }
        self.error_tiles.insert(*tile, url);
    }

    fn clear_error(&mut self, tile: &TileInfo) {
        if let Some(url) = self.error_tiles.remove(tile) {
            if let Some(manager) = &self.error_manager {
                manager.remove_error(&url);
            }
        }
    }

    pub(crate) fn set_error_manager(&mut self, manager: Option<Arc<dyn ErrorManager>>) {
        self.error_manager = manager;
    }

    pub(crate) fn error_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.error_tiles.values().cloned().collect();
        urls.sort();
        urls
    }

    // =========================================================================
    // Outdated tiles
    // =========================================================================

    fn schedule_outdated_eviction(&self, generation: u64) {
        let actor = self.self_actor.clone();
        let config = TaskConfig::new(EVICT_TASK_NAME)
            .with_delay(self.config.outdated_tile_timeout())
            .with_priority(TaskPriority::Low);
        self.scheduler.add_task(Task::new(config, move || {
            actor.send("on_outdated_timeout", move |source| source.on_outdated_timeout(generation));
        }));
    }

    fn on_outdated_timeout(&mut self, generation: u64) {
        let expired: Vec<TileInfo> = self
            .outdated_tiles
            .iter()
            .filter(|(_, retired)| retired.generation <= generation)
            .map(|(tile, _)| *tile)
            .collect();
        if expired.is_empty() {
            return;
        }
        for tile in &expired {
            if let Some(mut retired) = self.outdated_tiles.remove(tile) {
                retired.wrapper.release_render_state();
            }
        }
        self.metrics.tiles_evicted(expired.len());
        debug!(source = %self.name, count = expired.len(), "Outdated tiles timed out");
        self.publish();
    }

    /// Evicts all outdated tiles once no load is in flight.
    fn evict_outdated_if_settled(&mut self) -> bool {
        if self.outdated_tiles.is_empty() || !self.loading_tiles.lock().is_empty() {
            return false;
        }
        let count = self.outdated_tiles.len();
        for retired in self.outdated_tiles.values_mut() {
            retired.wrapper.release_render_state();
        }
        self.outdated_tiles.clear();
        self.metrics.tiles_evicted(count);
        debug!(source = %self.name, count, "Outdated tiles evicted");
        true
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    pub(crate) fn force_reload(&mut self) {
        info!(source = %self.name, "Forcing reload");

        let loading: Vec<TileInfo> = self.loading_tiles.lock().keys().copied().collect();
        for tile in loading {
            self.cancel_load(&tile, None);
        }

        let current = std::mem::take(&mut self.current_tiles);
        if !current.is_empty() {
            self.outdated_generation += 1;
            for (tile, wrapper) in current {
                self.retire(tile, wrapper);
            }
            self.schedule_outdated_eviction(self.outdated_generation);
        }

        self.failed_tiles.clear();
        let errored: Vec<TileInfo> = self.error_tiles.keys().copied().collect();
        for tile in errored {
            self.clear_error(&tile);
        }

        if !self.paused {
            self.issue_missing_loads();
        }
        self.evict_outdated_if_settled();
        self.publish();
    }

    pub(crate) fn pause(&mut self) {
        if self.paused {
            return;
        }
        self.paused = true;
        for wrapper in self.current_tiles.values_mut() {
            wrapper.release_render_state();
        }
        for retired in self.outdated_tiles.values_mut() {
            retired.wrapper.release_render_state();
            retired.wrapper.set_state(TileState::Cached);
        }
        info!(source = %self.name, loading = self.loading_tiles.lock().len(), "Source paused");
        self.publish();
    }

    pub(crate) fn resume(&mut self) {
        if !self.paused {
            return;
        }
        self.paused = false;
        info!(source = %self.name, "Source resumed");
        self.issue_missing_loads();
        self.publish();
    }

    pub(crate) fn view(&self) -> Option<View> {
        self.view
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.paused
    }

    pub(crate) fn set_min_zoom_level_identifier(&mut self, identifier: Option<i32>) {
        self.min_zoom_level_identifier = identifier;
    }

    pub(crate) fn set_max_zoom_level_identifier(&mut self, identifier: Option<i32>) {
        self.max_zoom_level_identifier = identifier;
    }

    pub(crate) fn min_zoom_level_identifier(&self) -> Option<i32> {
        self.min_zoom_level_identifier
    }

    pub(crate) fn max_zoom_level_identifier(&self) -> Option<i32> {
        self.max_zoom_level_identifier
    }

    // =========================================================================
    // Renderer callbacks
    // =========================================================================

    pub(crate) fn set_tile_ready(&mut self, tile: VersionedTileInfo) -> bool {
        match self.current_tiles.get_mut(&tile.tile) {
            Some(wrapper) if wrapper.version() == tile.version => {
                if wrapper.state() == TileState::InSetup {
                    wrapper.set_state(TileState::Visible);
                }
                true
            }
            _ => {
                trace!(tile = %tile, "Ignoring ready callback for stale tile");
                false
            }
        }
    }

    pub(crate) fn set_render_state(
        &mut self,
        tile: VersionedTileInfo,
        render_state: RenderState,
    ) -> bool {
        match self.current_tiles.get_mut(&tile.tile) {
            Some(wrapper) if wrapper.version() == tile.version => {
                wrapper.set_render_state(render_state);
                true
            }
            _ => false,
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub(crate) fn ready_state(&self) -> LayerReadyState {
        if self.view.is_none() {
            return LayerReadyState::NotReady;
        }
        let mut state = LayerReadyState::Ready;
        for prioritized in &self.desired {
            let tile = &prioritized.tile;
            if self.current_tiles.contains_key(tile) {
                continue;
            }
            match self.failed_tiles.get(tile) {
                Some(TileFailure::Empty) => {}
                Some(TileFailure::Decode) => return LayerReadyState::Error,
                Some(TileFailure::Load(status)) if !status.is_recoverable() => {
                    return LayerReadyState::Error
                }
                _ => state = LayerReadyState::NotReady,
            }
        }
        state
    }

    pub(crate) fn is_tile_visible(&self, tile: &TileInfo) -> bool {
        self.desired_set.contains(tile)
    }

    pub(crate) fn desired_tiles(&self) -> Vec<PrioritizedTileInfo> {
        self.desired.clone()
    }

    pub(crate) fn loading_count(&self) -> usize {
        self.loading_tiles.lock().len()
    }

    pub(crate) fn snapshot(&self) -> TileSnapshot<D::Output> {
        let entry = |tile: &TileInfo, wrapper: &TileWrapper<D::Output>| TileEntry {
            tile: VersionedTileInfo::new(*tile, wrapper.version()),
            result: Arc::clone(wrapper.result()),
            state: wrapper.state(),
            tessellation_factor: wrapper.tessellation_factor(),
        };
        TileSnapshot {
            current: self
                .current_tiles
                .iter()
                .map(|(tile, wrapper)| entry(tile, wrapper))
                .collect(),
            outdated: self
                .outdated_tiles
                .iter()
                .map(|(tile, retired)| entry(tile, &retired.wrapper))
                .collect(),
        }
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    pub(crate) fn add_listener(&mut self, listener: Weak<dyn TilesListener<D::Output>>) {
        self.listeners.push(listener);
    }

    /// Queues a coalesced tile-set notification on the graphics queue.
    fn publish(&self) {
        self.metrics
            .set_tile_counts(self.current_tiles.len(), self.outdated_tiles.len());
        let queued = self.self_actor.message(
            ExecutionEnvironment::Graphics,
            DuplicationStrategy::ReplaceNewest,
            "notify_tiles_updated",
            |source| source.deliver_tiles_updated(),
        );
        if let Err(error) = queued {
            warn!(source = %self.name, %error, "Failed to queue tile notification");
        }
    }

    fn deliver_tiles_updated(&mut self) {
        self.listeners.retain(|listener| listener.strong_count() > 0);
        if self.listeners.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        for listener in self.listeners.iter().filter_map(Weak::upgrade) {
            listener.on_tiles_updated(&self.name, snapshot.clone());
        }
        self.metrics.notification_sent();
    }
}
