//! End-to-end test: a source backed by files on disk, driven by the
//! thread-pool scheduler with a simulated render loop.
//!
//! Run with: `cargo test --test file_source`

use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::Mutex;
use tempfile::TempDir;

use tileflow::config::GridLayerConfig;
use tileflow::error_manager::DefaultErrorManager;
use tileflow::loader::{FileLoader, LoaderStatus};
use tileflow::scheduler::{ThreadPoolScheduler, ThreadPoolSchedulerConfig};
use tileflow::source::{BytesDecoder, LayerReadyState, TileSnapshot, TiledSource, TilesListener};
use tileflow::tile::RectCoord;

struct LastSnapshot {
    snapshot: Mutex<Option<TileSnapshot<Bytes>>>,
}

impl TilesListener<Bytes> for LastSnapshot {
    fn on_tiles_updated(&self, _source_name: &str, snapshot: TileSnapshot<Bytes>) {
        *self.snapshot.lock() = Some(snapshot);
    }
}

fn tile_dir(tiles: &[&str]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for tile in tiles {
        let path = dir.path().join(tile);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, format!("payload {tile}")).unwrap();
    }
    dir
}

/// Pumps the graphics queue until `done` holds or the deadline passes.
fn render_until(
    scheduler: &ThreadPoolScheduler,
    deadline: Duration,
    mut done: impl FnMut() -> bool,
) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        scheduler.run_graphics_tasks();
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    false
}

fn layer() -> Arc<GridLayerConfig> {
    Arc::new(
        GridLayerConfig::new("files", "{z}/{x}/{y}.bin")
            .with_bounds(RectCoord::from_corners(0.0, 0.0, 4.0, 4.0))
            .with_base_zoom(1000.0)
            .with_zoom_levels(0, 2),
    )
}

#[test]
fn test_file_backed_source_becomes_ready() {
    let dir = tile_dir(&["1/0/0.bin", "1/0/1.bin", "1/1/0.bin", "1/1/1.bin"]);
    let config = ThreadPoolSchedulerConfig::default().with_worker_count(2);
    let scheduler = Arc::new(ThreadPoolScheduler::new(config).unwrap());
    let listener = Arc::new(LastSnapshot {
        snapshot: Mutex::new(None),
    });
    let source = TiledSource::builder(layer(), Arc::new(BytesDecoder), scheduler.clone())
        .loader(Arc::new(FileLoader::new(dir.path()).unwrap()))
        .listener(&listener)
        .build();

    source.on_visible_bounds_changed(RectCoord::from_corners(0.0, 0.0, 4.0, 4.0), 0, 700.0);

    let published = render_until(&scheduler, Duration::from_secs(10), || {
        listener
            .snapshot
            .lock()
            .as_ref()
            .is_some_and(|snapshot| snapshot.current.len() == 4)
    });
    assert!(published, "listener never saw all four tiles");
    assert_eq!(source.is_ready_to_render_offscreen(), LayerReadyState::Ready);

    let snapshot = listener.snapshot.lock().clone().unwrap();
    let first = &snapshot.current[0];
    assert_eq!(*first.result, Bytes::from("payload 1/0/0.bin"));
    assert!(snapshot.outdated.is_empty());

    let metrics = source.metrics().snapshot();
    assert_eq!(metrics.loads_succeeded, 4);
    assert_eq!(metrics.loads_active, 0);
}

#[test]
fn test_missing_file_is_reported() {
    let dir = tile_dir(&["0/0/0.bin"]);
    let config = ThreadPoolSchedulerConfig::default().with_worker_count(2);
    let scheduler = Arc::new(ThreadPoolScheduler::new(config).unwrap());
    let errors = Arc::new(DefaultErrorManager::new());
    let source = TiledSource::builder(layer(), Arc::new(BytesDecoder), scheduler.clone())
        .loader(Arc::new(FileLoader::new(dir.path()).unwrap()))
        .error_manager(errors.clone())
        .build();

    source.on_visible_bounds_changed(RectCoord::from_corners(0.5, 0.5, 1.5, 1.5), 0, 700.0);

    let failed = render_until(&scheduler, Duration::from_secs(10), || {
        source.is_ready_to_render_offscreen() == LayerReadyState::Error
    });
    assert!(failed, "source never reported the missing tile");
    let error = errors.get("1/0/0.bin").unwrap();
    assert_eq!(error.status, LoaderStatus::Error404);
}
