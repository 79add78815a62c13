//! Integration tests for the tiled source lifecycle.
//!
//! These tests drive a `TiledSource` through a deterministic
//! `ManualScheduler` and verify:
//! - Loader chain fallback and terminal error reporting
//! - Idempotent view updates and cancellation of tiles that leave the view
//! - Forced reloads racing an in-flight decode
//! - Pause/resume, outdated tile eviction and offscreen readiness
//! - Coalesced listener notifications
//! - Completion of loads and decodes under a bounded mailbox or a
//!   panicking decoder
//!
//! Run with: `cargo test --test source_lifecycle`

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;

use tileflow::config::{GridLayerConfig, SourceConfig};
use tileflow::error::DecodeError;
use tileflow::error_manager::DefaultErrorManager;
use tileflow::loader::{Loader, LoaderResult, LoaderStatus};
use tileflow::scheduler::{ManualScheduler, Scheduler, Task};
use tileflow::source::{
    BytesDecoder, CancelProbe, LayerReadyState, TileDecoder, TileSnapshot, TiledSource,
    TilesListener, LOAD_TASK_NAME,
};
use tileflow::tile::{RectCoord, TileInfo, TileState, VersionedTileInfo};

// ============================================================================
// Test Doubles
// ============================================================================

type Hook = Mutex<Option<Box<dyn FnOnce() + Send>>>;

fn run_hook(hook: &Hook) {
    let hook = hook.lock().take();
    if let Some(hook) = hook {
        hook();
    }
}

/// Loader with per-URL scripted statuses.
struct ScriptedLoader {
    name: &'static str,
    default_status: LoaderStatus,
    statuses: Mutex<HashMap<String, LoaderStatus>>,
    calls: Mutex<Vec<String>>,
    cancelled: Mutex<Vec<String>>,
    on_first_load: Hook,
}

impl ScriptedLoader {
    fn new(name: &'static str, default_status: LoaderStatus) -> Arc<Self> {
        Arc::new(Self {
            name,
            default_status,
            statuses: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            on_first_load: Mutex::new(None),
        })
    }

    fn set_status(&self, url: &str, status: LoaderStatus) {
        self.statuses.lock().insert(url.to_string(), status);
    }

    fn set_hook(&self, hook: impl FnOnce() + Send + 'static) {
        *self.on_first_load.lock() = Some(Box::new(hook));
    }

    fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().iter().filter(|call| *call == url).count()
    }

    fn was_cancelled(&self, url: &str) -> bool {
        self.cancelled.lock().iter().any(|cancelled| cancelled == url)
    }
}

impl Loader for ScriptedLoader {
    fn name(&self) -> &str {
        self.name
    }

    fn load_data(&self, url: &str, _etag: Option<&str>) -> LoaderResult<Bytes> {
        self.calls.lock().push(url.to_string());
        run_hook(&self.on_first_load);
        let status = self
            .statuses
            .lock()
            .get(url)
            .copied()
            .unwrap_or(self.default_status);
        match status {
            LoaderStatus::Ok => LoaderResult::ok(Bytes::from(format!("{}:{}", self.name, url))),
            LoaderStatus::Noop => LoaderResult::noop(),
            status => LoaderResult::error(status, Some(format!("{}-{}", self.name, status))),
        }
    }

    fn cancel(&self, url: &str) {
        self.cancelled.lock().push(url.to_string());
    }
}

/// Expensive decoder that tags its output with the load version.
#[derive(Default)]
struct VersionDecoder {
    during_decode: Hook,
}

impl TileDecoder for VersionDecoder {
    type Output = String;

    fn has_expensive_post_loading_task(&self) -> bool {
        true
    }

    fn decode(
        &self,
        payload: Bytes,
        _tile: &TileInfo,
        probe: &CancelProbe,
    ) -> Result<Option<String>, DecodeError> {
        if probe.is_cancelled() {
            return Ok(None);
        }
        run_hook(&self.during_decode);
        if probe.is_cancelled() {
            return Ok(None);
        }
        let text = String::from_utf8_lossy(&payload);
        Ok(Some(format!("{}#{}", text, probe.version())))
    }
}

struct MalformedDecoder;

impl TileDecoder for MalformedDecoder {
    type Output = ();

    fn has_expensive_post_loading_task(&self) -> bool {
        false
    }

    fn decode(
        &self,
        _payload: Bytes,
        _tile: &TileInfo,
        _probe: &CancelProbe,
    ) -> Result<Option<()>, DecodeError> {
        Err(DecodeError::Malformed("bad header".to_string()))
    }
}

/// Decoder that panics, either inline or in its own decode task.
struct PanickingDecoder {
    expensive: bool,
}

impl TileDecoder for PanickingDecoder {
    type Output = ();

    fn has_expensive_post_loading_task(&self) -> bool {
        self.expensive
    }

    fn decode(
        &self,
        _payload: Bytes,
        tile: &TileInfo,
        _probe: &CancelProbe,
    ) -> Result<Option<()>, DecodeError> {
        panic!("truncated payload for {}", tile);
    }
}

struct RecordingListener<R> {
    updates: Mutex<Vec<(String, TileSnapshot<R>)>>,
}

impl<R> RecordingListener<R> {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            updates: Mutex::new(Vec::new()),
        })
    }

    fn count(&self) -> usize {
        self.updates.lock().len()
    }
}

impl<R: Send + Sync> TilesListener<R> for RecordingListener<R> {
    fn on_tiles_updated(&self, source_name: &str, snapshot: TileSnapshot<R>) {
        self.updates.lock().push((source_name.to_string(), snapshot));
    }
}

/// Manual scheduler that can swallow tile fetches, leaving them in flight
/// forever.
struct TestScheduler {
    inner: ManualScheduler,
    drop_loads: AtomicBool,
}

impl TestScheduler {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: ManualScheduler::new(),
            drop_loads: AtomicBool::new(false),
        })
    }

    fn run(&self) -> usize {
        self.inner.run_until_idle()
    }

    fn park_loads(&self) {
        self.drop_loads.store(true, Ordering::SeqCst);
    }

    fn advance(&self, duration: Duration) {
        self.inner.advance_time(duration);
        self.inner.run_until_idle();
    }
}

impl Scheduler for TestScheduler {
    fn add_task(&self, task: Task) {
        if self.drop_loads.load(Ordering::SeqCst) && task.name() == LOAD_TASK_NAME {
            return;
        }
        self.inner.add_task(task);
    }

    fn remove_task(&self, name: &str) -> usize {
        self.inner.remove_task(name)
    }

    fn pause(&self) {
        self.inner.pause();
    }

    fn resume(&self) {
        self.inner.resume();
    }

    fn clear(&self) {
        self.inner.clear();
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Three-level grid over (0,0)-(4,4); level n is drawn at zoom 1000 / 2^n.
fn layer() -> Arc<GridLayerConfig> {
    Arc::new(
        GridLayerConfig::new("grid", "{z}/{x}/{y}")
            .with_bounds(RectCoord::from_corners(0.0, 0.0, 4.0, 4.0))
            .with_base_zoom(1000.0)
            .with_zoom_levels(0, 2),
    )
}

/// Whole layer at level 0: tile `0/0/0`.
const COARSE_ZOOM: f64 = 1500.0;
/// Level 1.
const MEDIUM_ZOOM: f64 = 700.0;

fn full_view() -> RectCoord {
    RectCoord::from_corners(0.0, 0.0, 4.0, 4.0)
}

/// Level 1 strip covering tiles `1/0/0` and `1/1/0`.
fn strip_view() -> RectCoord {
    RectCoord::from_corners(0.5, 0.5, 3.5, 1.5)
}

struct Harness<D: TileDecoder> {
    scheduler: Arc<TestScheduler>,
    source: TiledSource<D>,
    errors: Arc<DefaultErrorManager>,
    listener: Arc<RecordingListener<D::Output>>,
}

impl<D: TileDecoder> Harness<D> {
    fn new(decoder: Arc<D>, loaders: &[&Arc<ScriptedLoader>], config: SourceConfig) -> Self {
        let scheduler = TestScheduler::new();
        let errors = Arc::new(DefaultErrorManager::new());
        let listener = RecordingListener::new();
        let source = TiledSource::builder(layer(), decoder, scheduler.clone())
            .loaders(loaders.iter().map(|loader| Arc::clone(*loader) as Arc<dyn Loader>))
            .config(config)
            .error_manager(errors.clone())
            .listener(&listener)
            .build();
        Self {
            scheduler,
            source,
            errors,
            listener,
        }
    }

    fn view(&self, bounds: RectCoord, zoom: f64) {
        self.source.on_visible_bounds_changed(bounds, 0, zoom);
        self.scheduler.run();
    }

    fn snapshot(&self) -> TileSnapshot<D::Output> {
        let reply = self.source.current_tiles();
        self.scheduler.run();
        reply.wait().unwrap()
    }

    fn current_urls(&self) -> Vec<String> {
        self.snapshot().current_tiles().map(url).collect()
    }
}

fn url(tile: &TileInfo) -> String {
    format!("{}/{}/{}", tile.zoom_identifier, tile.x, tile.y)
}

fn bytes_harness(loaders: &[&Arc<ScriptedLoader>]) -> Harness<BytesDecoder> {
    Harness::new(Arc::new(BytesDecoder), loaders, SourceConfig::default())
}

// ============================================================================
// Loader Chain
// ============================================================================

/// NOOP then OK, and 404 then OK: both tiles load and nothing is reported.
#[test]
fn test_chain_fallback_reports_no_error() {
    let primary = ScriptedLoader::new("a", LoaderStatus::Ok);
    primary.set_status("1/0/0", LoaderStatus::Noop);
    primary.set_status("1/1/0", LoaderStatus::Error404);
    let fallback = ScriptedLoader::new("b", LoaderStatus::Ok);
    let harness = bytes_harness(&[&primary, &fallback]);

    harness.view(strip_view(), MEDIUM_ZOOM);

    assert_eq!(harness.current_urls(), vec!["1/0/0", "1/1/0"]);
    assert!(harness.errors.is_empty());
    assert!(harness.source.error_urls().is_empty());
    assert_eq!(harness.source.is_ready_to_render_offscreen(), LayerReadyState::Ready);

    let snapshot = harness.snapshot();
    let payloads: Vec<_> = snapshot.current.iter().map(|entry| (*entry.result).clone()).collect();
    assert_eq!(payloads, vec![Bytes::from("b:1/0/0"), Bytes::from("b:1/1/0")]);
}

/// A chain that ends in 404 is reported once and never re-requested.
#[test]
fn test_terminal_failure_reported_once() {
    let loader = ScriptedLoader::new("a", LoaderStatus::Ok);
    loader.set_status("1/1/0", LoaderStatus::Error404);
    let harness = bytes_harness(&[&loader]);

    harness.view(strip_view(), MEDIUM_ZOOM);
    harness.view(strip_view(), MEDIUM_ZOOM);

    assert_eq!(harness.errors.len(), 1);
    let error = harness.errors.get("1/1/0").unwrap();
    assert_eq!(error.status, LoaderStatus::Error404);
    assert_eq!(error.layer_name, "grid");
    assert!(!error.is_recoverable);
    assert!(error.bounds.is_some());
    assert_eq!(loader.calls_for("1/1/0"), 1);
    assert_eq!(harness.source.error_urls(), vec!["1/1/0"]);
    assert_eq!(harness.source.is_ready_to_render_offscreen(), LayerReadyState::Error);
    assert_eq!(harness.source.metrics().snapshot().loads_failed, 1);
}

#[test]
fn test_recoverable_failure_is_not_ready() {
    let loader = ScriptedLoader::new("a", LoaderStatus::ErrorTimeout);
    let harness = bytes_harness(&[&loader]);

    harness.view(full_view(), COARSE_ZOOM);

    assert_eq!(harness.source.is_ready_to_render_offscreen(), LayerReadyState::NotReady);
    assert!(harness.errors.get("0/0/0").unwrap().is_recoverable);
}

/// Tiles no loader has are empty, not missing.
#[test]
fn test_all_loaders_noop_counts_as_ready() {
    let loader = ScriptedLoader::new("a", LoaderStatus::Noop);
    let harness = bytes_harness(&[&loader]);

    harness.view(strip_view(), MEDIUM_ZOOM);

    assert!(harness.current_urls().is_empty());
    assert!(harness.errors.is_empty());
    assert_eq!(harness.source.is_ready_to_render_offscreen(), LayerReadyState::Ready);
}

#[test]
fn test_decode_failure_is_reported() {
    let loader = ScriptedLoader::new("a", LoaderStatus::Ok);
    let harness = Harness::new(Arc::new(MalformedDecoder), &[&loader], SourceConfig::default());

    harness.view(full_view(), COARSE_ZOOM);

    assert_eq!(harness.source.is_ready_to_render_offscreen(), LayerReadyState::Error);
    let error = harness.errors.get("0/0/0").unwrap();
    assert_eq!(error.status, LoaderStatus::ErrorOther);
    assert!(error.error_code.unwrap().contains("bad header"));
    assert_eq!(harness.source.metrics().snapshot().decodes_failed, 1);
}

fn assert_decoder_panic_fails_tile(expensive: bool) {
    let loader = ScriptedLoader::new("a", LoaderStatus::Ok);
    let decoder = Arc::new(PanickingDecoder { expensive });
    let harness = Harness::new(decoder, &[&loader], SourceConfig::default());

    harness.view(full_view(), COARSE_ZOOM);

    assert_eq!(harness.source.loading_count(), 0);
    assert_eq!(harness.source.is_ready_to_render_offscreen(), LayerReadyState::Error);
    let error = harness.errors.get("0/0/0").unwrap();
    assert_eq!(error.status, LoaderStatus::ErrorOther);
    assert!(error.error_code.unwrap().contains("decoder panicked"));
    assert_eq!(harness.source.metrics().snapshot().decodes_failed, 1);

    // The failure is settled: the same view does not fetch again.
    harness.view(full_view(), COARSE_ZOOM);
    assert_eq!(loader.call_count(), 1);
}

#[test]
fn test_inline_decoder_panic_fails_tile() {
    assert_decoder_panic_fails_tile(false);
}

#[test]
fn test_decode_task_panic_fails_tile() {
    assert_decoder_panic_fails_tile(true);
}

/// With a one-message mailbox already full when the fetch finishes, the
/// load result must still arrive.
#[test]
fn test_completions_bypass_mailbox_capacity() {
    let loader = ScriptedLoader::new("a", LoaderStatus::Ok);
    let config = SourceConfig::default().with_mailbox_capacity(1);
    let harness = Harness::new(Arc::new(BytesDecoder), &[&loader], config);

    let source = harness.source.clone();
    loader.set_hook(move || {
        let elsewhere = TileInfo::new(RectCoord::from_corners(0.0, 0.0, 1.0, 1.0), 9, 9, 0, 2, 1);
        source.set_tile_ready(VersionedTileInfo::new(elsewhere, 99));
    });

    harness.view(full_view(), COARSE_ZOOM);

    assert_eq!(harness.source.loading_count(), 0);
    assert_eq!(harness.current_urls(), vec!["0/0/0"]);
    assert_eq!(harness.source.is_ready_to_render_offscreen(), LayerReadyState::Ready);

    harness.view(full_view(), COARSE_ZOOM);
    assert_eq!(loader.call_count(), 1);
    assert_eq!(harness.source.metrics().snapshot().loads_requested, 1);
}

// ============================================================================
// Desired Set
// ============================================================================

#[test]
fn test_not_ready_before_first_view() {
    let loader = ScriptedLoader::new("a", LoaderStatus::Ok);
    let harness = bytes_harness(&[&loader]);
    assert_eq!(harness.source.is_ready_to_render_offscreen(), LayerReadyState::NotReady);
}

/// Repeating a view issues no further loads, in flight or after completion.
#[test]
fn test_identical_bounds_issue_no_additional_loads() {
    let loader = ScriptedLoader::new("a", LoaderStatus::Ok);
    let harness = bytes_harness(&[&loader]);

    harness.source.on_visible_bounds_changed(strip_view(), 0, MEDIUM_ZOOM);
    harness.source.on_visible_bounds_changed(strip_view(), 0, MEDIUM_ZOOM);
    harness.scheduler.run();
    assert_eq!(loader.call_count(), 2);

    harness.view(strip_view(), MEDIUM_ZOOM);
    assert_eq!(loader.call_count(), 2);
    assert_eq!(harness.source.metrics().snapshot().loads_requested, 2);
}

/// A tile leaving the view mid-fetch is cancelled and its late result
/// never reaches the current tiles.
#[test]
fn test_cancelled_load_result_is_dropped() {
    let loader = ScriptedLoader::new("a", LoaderStatus::Ok);
    let harness = bytes_harness(&[&loader]);
    {
        let source = harness.source.clone();
        let scheduler = harness.scheduler.clone();
        loader.set_hook(move || {
            source.on_visible_bounds_changed(strip_view(), 0, MEDIUM_ZOOM);
            scheduler.run();
        });
    }

    harness.view(full_view(), COARSE_ZOOM);

    assert!(loader.was_cancelled("0/0/0"));
    assert_eq!(harness.current_urls(), vec!["1/0/0", "1/1/0"]);
    let coarse = TileInfo::new(full_view(), 0, 0, 0, 0, 0);
    assert!(!harness.source.is_tile_visible(&coarse));
    assert_eq!(harness.source.metrics().snapshot().loads_cancelled, 1);
    assert_eq!(harness.source.loading_count(), 0);
}

#[test]
fn test_zoom_range_applies_on_next_bounds_change() {
    let loader = ScriptedLoader::new("a", LoaderStatus::Ok);
    let harness = bytes_harness(&[&loader]);

    harness.source.set_max_zoom_level_identifier(Some(0));
    harness.view(strip_view(), MEDIUM_ZOOM);

    assert_eq!(harness.current_urls(), vec!["0/0/0"]);
    assert_eq!(harness.source.zoom_level_identifier_range(), (None, Some(0)));
}

/// Coarser layers drawn underneath count towards readiness.
#[test]
fn test_previous_layers_required_for_readiness() {
    let loader = ScriptedLoader::new("a", LoaderStatus::Ok);
    loader.set_status("0/0/0", LoaderStatus::ErrorTimeout);
    let config = SourceConfig {
        num_draw_previous_layers: Some(1),
        ..SourceConfig::default()
    };
    let harness = Harness::new(Arc::new(BytesDecoder), &[&loader], config);

    harness.view(strip_view(), MEDIUM_ZOOM);

    let desired = harness.source.desired_tiles();
    assert_eq!(desired.len(), 3);
    assert_eq!(desired.last().map(|p| url(&p.tile)), Some("0/0/0".to_string()));
    assert_eq!(harness.current_urls(), vec!["1/0/0", "1/1/0"]);
    assert_eq!(harness.source.is_ready_to_render_offscreen(), LayerReadyState::NotReady);
}

#[test]
fn test_error_removed_when_tile_leaves_view() {
    let loader = ScriptedLoader::new("a", LoaderStatus::Ok);
    loader.set_status("1/1/0", LoaderStatus::Error404);
    let harness = bytes_harness(&[&loader]);

    harness.view(strip_view(), MEDIUM_ZOOM);
    assert_eq!(harness.errors.len(), 1);

    harness.view(full_view(), COARSE_ZOOM);
    assert!(harness.errors.is_empty());
    assert_eq!(harness.source.is_ready_to_render_offscreen(), LayerReadyState::Ready);
}

// ============================================================================
// Reload
// ============================================================================

#[test]
fn test_force_reload_refetches_and_clears_errors() {
    let loader = ScriptedLoader::new("a", LoaderStatus::Ok);
    loader.set_status("1/1/0", LoaderStatus::Error404);
    let harness = bytes_harness(&[&loader]);
    harness.view(strip_view(), MEDIUM_ZOOM);
    let first = harness.snapshot().current[0].tile;

    loader.set_status("1/1/0", LoaderStatus::Ok);
    harness.source.force_reload();
    harness.scheduler.run();

    assert!(harness.errors.is_empty());
    assert_eq!(harness.current_urls(), vec!["1/0/0", "1/1/0"]);
    assert_eq!(loader.calls_for("1/0/0"), 2);
    assert_eq!(loader.calls_for("1/1/0"), 2);
    let reloaded = harness.snapshot().current[0].tile;
    assert_eq!(reloaded.tile, first.tile);
    assert!(reloaded.version > first.version);
}

/// A reload during decode wins over the decode it interrupted.
#[test]
fn test_force_reload_mid_decode_keeps_newer_version() {
    let loader = ScriptedLoader::new("a", LoaderStatus::Ok);
    let decoder = Arc::new(VersionDecoder::default());
    let harness = Harness::new(decoder.clone(), &[&loader], SourceConfig::default());
    {
        let source = harness.source.clone();
        let scheduler = harness.scheduler.clone();
        *decoder.during_decode.lock() = Some(Box::new(move || {
            source.force_reload();
            scheduler.run();
        }));
    }

    harness.view(full_view(), COARSE_ZOOM);

    let snapshot = harness.snapshot();
    assert_eq!(snapshot.current.len(), 1);
    let entry = &snapshot.current[0];
    assert_eq!(entry.tile.version, 2);
    assert_eq!(*entry.result, "a:0/0/0#2");
    assert!(loader.was_cancelled("0/0/0"));
    assert_eq!(harness.source.metrics().snapshot().decodes_discarded, 1);
}

// ============================================================================
// Pause / Resume
// ============================================================================

#[test]
fn test_pause_defers_loads_until_resume() {
    let loader = ScriptedLoader::new("a", LoaderStatus::Ok);
    let harness = bytes_harness(&[&loader]);

    harness.source.pause();
    harness.view(strip_view(), MEDIUM_ZOOM);

    assert!(harness.source.is_paused());
    assert_eq!(loader.call_count(), 0);
    assert_eq!(harness.source.loading_count(), 0);
    assert_eq!(harness.source.desired_tiles().len(), 2);
    assert_eq!(harness.source.is_ready_to_render_offscreen(), LayerReadyState::NotReady);

    harness.source.resume();
    harness.scheduler.run();

    assert_eq!(loader.call_count(), 2);
    assert_eq!(harness.source.is_ready_to_render_offscreen(), LayerReadyState::Ready);
}

/// Loads queued before a pause are dropped and re-issued on resume.
#[test]
fn test_pause_after_view_change_drops_queued_loads() {
    let loader = ScriptedLoader::new("a", LoaderStatus::Ok);
    let harness = bytes_harness(&[&loader]);

    harness.source.on_visible_bounds_changed(strip_view(), 0, MEDIUM_ZOOM);
    harness.source.pause();
    harness.scheduler.run();
    assert_eq!(loader.call_count(), 0);
    assert_eq!(harness.source.metrics().snapshot().loads_cancelled, 2);

    harness.source.resume();
    harness.scheduler.run();
    assert_eq!(harness.current_urls(), vec!["1/0/0", "1/1/0"]);
}

#[test]
fn test_pause_releases_render_state_without_refetch() {
    let loader = ScriptedLoader::new("a", LoaderStatus::Ok);
    let harness = bytes_harness(&[&loader]);
    harness.view(full_view(), COARSE_ZOOM);

    let tile = harness.snapshot().current[0].tile;
    harness.source.set_render_state(tile, Arc::new(7u32));
    harness.source.set_tile_ready(tile);
    harness.scheduler.run();
    assert_eq!(harness.snapshot().current[0].state, TileState::Visible);

    harness.source.pause();
    harness.scheduler.run();
    assert_eq!(harness.snapshot().current[0].state, TileState::InSetup);

    harness.source.resume();
    harness.source.set_tiles_ready(vec![tile]);
    harness.scheduler.run();
    assert_eq!(harness.snapshot().current[0].state, TileState::Visible);
    assert_eq!(loader.call_count(), 1);
}

// ============================================================================
// Outdated Tiles
// ============================================================================

#[test]
fn test_outdated_tiles_evicted_once_replacements_settle() {
    let loader = ScriptedLoader::new("a", LoaderStatus::Ok);
    let harness = bytes_harness(&[&loader]);
    harness.view(full_view(), COARSE_ZOOM);

    harness.view(full_view(), MEDIUM_ZOOM);

    let snapshot = harness.snapshot();
    assert_eq!(snapshot.current.len(), 4);
    assert!(snapshot.outdated.is_empty());
    assert_eq!(harness.source.metrics().snapshot().tiles_evicted, 1);
}

/// Replacements that never arrive do not pin outdated tiles forever.
#[test]
fn test_outdated_tiles_evicted_after_timeout() {
    let loader = ScriptedLoader::new("a", LoaderStatus::Ok);
    let config = SourceConfig::default().with_outdated_tile_timeout(Duration::from_millis(1000));
    let harness = Harness::new(Arc::new(BytesDecoder), &[&loader], config);
    harness.view(full_view(), COARSE_ZOOM);

    harness.scheduler.park_loads();
    harness.view(full_view(), MEDIUM_ZOOM);

    let snapshot = harness.snapshot();
    assert!(snapshot.current.is_empty());
    assert_eq!(snapshot.outdated.len(), 1);
    assert_eq!(snapshot.outdated[0].state, TileState::Cached);
    assert_eq!(harness.source.loading_count(), 4);

    harness.scheduler.advance(Duration::from_millis(999));
    assert_eq!(harness.snapshot().outdated.len(), 1);

    harness.scheduler.advance(Duration::from_millis(1));
    assert!(harness.snapshot().outdated.is_empty());
    assert_eq!(harness.source.metrics().snapshot().tiles_evicted, 1);
}

/// Returning to a view restores its outdated tiles without refetching.
#[test]
fn test_outdated_tile_revived_when_back_in_view() {
    let loader = ScriptedLoader::new("a", LoaderStatus::Ok);
    let harness = bytes_harness(&[&loader]);
    harness.view(full_view(), COARSE_ZOOM);

    harness.scheduler.park_loads();
    harness.view(full_view(), MEDIUM_ZOOM);
    harness.view(full_view(), COARSE_ZOOM);

    assert_eq!(harness.current_urls(), vec!["0/0/0"]);
    assert!(harness.snapshot().outdated.is_empty());
    assert_eq!(loader.calls_for("0/0/0"), 1);
    assert_eq!(harness.source.loading_count(), 0);
    assert_eq!(harness.source.metrics().snapshot().loads_cancelled, 4);
}

// ============================================================================
// Notifications
// ============================================================================

/// Many tiles finishing in one drain cycle produce one notification.
#[test]
fn test_listener_notifications_are_coalesced() {
    let loader = ScriptedLoader::new("a", LoaderStatus::Ok);
    let harness = bytes_harness(&[&loader]);

    harness.view(full_view(), MEDIUM_ZOOM);

    assert_eq!(harness.listener.count(), 1);
    let updates = harness.listener.updates.lock();
    let (name, snapshot) = &updates[0];
    assert_eq!(name, "grid");
    assert_eq!(snapshot.current.len(), 4);
    assert_eq!(harness.source.metrics().snapshot().notifications_sent, 1);
}

#[test]
fn test_dropped_listener_is_not_called() {
    let loader = ScriptedLoader::new("a", LoaderStatus::Ok);
    let harness = bytes_harness(&[&loader]);
    let late = RecordingListener::<Bytes>::new();
    harness.source.add_listener(&late);

    harness.view(full_view(), COARSE_ZOOM);
    assert_eq!(late.count(), 1);

    let Harness { source, scheduler, listener, .. } = harness;
    drop(listener);
    source.force_reload();
    scheduler.run();

    assert_eq!(late.count(), 2);
    assert_eq!(source.metrics().snapshot().notifications_sent, 2);
}
