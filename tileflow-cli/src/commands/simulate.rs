//! Simulate command - drive one source through a view change.
//!
//! Stands in for a renderer: the main thread pumps the graphics queue once
//! per frame, acknowledges published tiles and stops when the layer is
//! ready or has failed.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use tileflow::error_manager::{DefaultErrorManager, TiledLayerError};
use tileflow::loader::{FileLoader, HttpLoader, Loader};
use tileflow::scheduler::{ThreadPoolScheduler, ThreadPoolSchedulerConfig};
use tileflow::source::{BytesDecoder, LayerReadyState, TileSnapshot, TiledSource, TilesListener};
use tileflow::telemetry::MetricsSnapshot;
use tileflow::tile::VersionedTileInfo;
use tracing::{debug, info, warn};

use super::common::{load_config, parse_bounds};
use crate::error::CliError;

/// Time between simulated frames.
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Arguments for the simulate command.
pub struct SimulateArgs {
    pub config: Option<PathBuf>,
    pub layer: Option<PathBuf>,
    pub root: Option<PathBuf>,
    pub http_base_url: Option<String>,
    pub bounds: Vec<f64>,
    pub zoom: f64,
    pub t: i32,
    pub workers: usize,
    pub timeout_secs: u64,
    pub reload: bool,
    pub json: bool,
}

/// Records tiles that still need a render-ready acknowledgement.
#[derive(Default)]
struct FrameListener {
    pending: Mutex<Vec<VersionedTileInfo>>,
    updates: AtomicUsize,
}

impl TilesListener<Bytes> for FrameListener {
    fn on_tiles_updated(&self, source_name: &str, snapshot: TileSnapshot<Bytes>) {
        self.updates.fetch_add(1, Ordering::Relaxed);
        debug!(
            source = source_name,
            current = snapshot.current.len(),
            outdated = snapshot.outdated.len(),
            "Tiles updated"
        );
        let mut pending = self.pending.lock();
        pending.extend(snapshot.current.iter().map(|entry| entry.tile));
    }
}

#[derive(Serialize)]
struct SimulationReport {
    layer: String,
    ready_state: LayerReadyState,
    elapsed_ms: u128,
    notifications: usize,
    tiles: Vec<String>,
    errors: Vec<TiledLayerError>,
    metrics: MetricsSnapshot,
}

fn build_loaders(
    root: Option<PathBuf>,
    http_base_url: Option<String>,
) -> Result<Vec<Arc<dyn Loader>>, CliError> {
    let mut loaders: Vec<Arc<dyn Loader>> = Vec::new();
    if let Some(root) = root {
        info!(root = %root.display(), "Using file loader");
        loaders.push(Arc::new(FileLoader::new(root)?));
    }
    if let Some(base_url) = http_base_url {
        info!(base_url = %base_url, "Using HTTP loader");
        loaders.push(Arc::new(HttpLoader::with_defaults()?.with_base_url(base_url)));
    }
    if loaders.is_empty() {
        return Err(CliError::Usage(
            "no loader configured: pass --root or --http-base-url, \
             or set loader_root in the config file"
                .to_string(),
        ));
    }
    Ok(loaders)
}

/// Pumps frames until the source leaves `NotReady` or `deadline` passes.
fn render_until_settled(
    scheduler: &ThreadPoolScheduler,
    source: &TiledSource<BytesDecoder>,
    listener: &FrameListener,
    deadline: Instant,
) -> Option<LayerReadyState> {
    while Instant::now() < deadline {
        scheduler.run_graphics_tasks();

        let published: Vec<VersionedTileInfo> = listener.pending.lock().drain(..).collect();
        if !published.is_empty() {
            source.set_tiles_ready(published);
        }

        match source.is_ready_to_render_offscreen() {
            LayerReadyState::NotReady => thread::sleep(FRAME_INTERVAL),
            settled => return Some(settled),
        }
    }
    None
}

/// Run the simulate command.
pub fn run(args: SimulateArgs) -> Result<(), CliError> {
    let config = load_config(args.config.as_deref(), args.layer.as_deref())?;
    let bounds = parse_bounds(&args.bounds)?;
    let loaders = build_loaders(
        args.root.or_else(|| config.loader_root.clone()),
        args.http_base_url.or_else(|| config.http_base_url.clone()),
    )?;
    let timeout = Duration::from_secs(args.timeout_secs);

    let scheduler = Arc::new(ThreadPoolScheduler::new(
        ThreadPoolSchedulerConfig::default().with_worker_count(args.workers),
    )?);
    let errors = Arc::new(DefaultErrorManager::new());
    let listener = Arc::new(FrameListener::default());
    let layer_name = config.layer.layer_name.clone();

    let layer = Arc::new(config.layer);
    let source = TiledSource::builder(layer, Arc::new(BytesDecoder), scheduler.clone())
        .loaders(loaders)
        .config(config.source)
        .error_manager(errors.clone())
        .listener(&listener)
        .build();

    let start = Instant::now();
    source.on_visible_bounds_changed(bounds, args.t, args.zoom);
    let mut outcome = render_until_settled(&scheduler, &source, &listener, start + timeout);

    if args.reload && outcome.is_some() {
        info!(source = source.name(), "Forcing reload");
        source.force_reload();
        // Queued behind the reload, so readiness is polled only once it ran.
        let _ = source.current_tiles().wait();
        outcome = render_until_settled(&scheduler, &source, &listener, Instant::now() + timeout);
    }
    let elapsed = start.elapsed();

    let Some(ready_state) = outcome else {
        warn!(
            source = source.name(),
            loading = source.loading_count(),
            "Layer did not settle"
        );
        scheduler.shutdown();
        return Err(CliError::Timeout(timeout));
    };

    let tiles: Vec<String> = source
        .current_tiles()
        .wait()
        .map(|snapshot| {
            snapshot
                .current
                .iter()
                .map(|entry| entry.tile.to_string())
                .collect()
        })
        .unwrap_or_default();
    let report = SimulationReport {
        layer: layer_name,
        ready_state,
        elapsed_ms: elapsed.as_millis(),
        notifications: listener.updates.load(Ordering::Relaxed),
        tiles,
        errors: errors.errors(),
        metrics: source.metrics().snapshot(),
    };
    scheduler.shutdown();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Layer:         {}", report.layer);
    println!("Ready state:   {:?}", report.ready_state);
    println!("Elapsed:       {:.2}s", elapsed.as_secs_f64());
    println!("Notifications: {}", report.notifications);
    println!();
    println!("Tiles ({}):", report.tiles.len());
    for tile in &report.tiles {
        println!("  {}", tile);
    }
    if !report.errors.is_empty() {
        println!();
        println!("Errors ({}):", report.errors.len());
        for error in &report.errors {
            println!("  {:?} {}", error.status, error.url);
        }
    }
    println!();
    print!("{}", report.metrics);
    Ok(())
}
