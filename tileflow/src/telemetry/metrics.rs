//! Lock-free atomic metrics collection.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use super::MetricsSnapshot;

/// Counters for one or more tile sources.
///
/// All operations use `Relaxed` ordering; the counters are independent
/// measurements.
#[derive(Debug)]
pub struct SourceMetrics {
    start_time: Instant,

    // === Load metrics ===
    loads_requested: AtomicU64,
    loads_succeeded: AtomicU64,
    loads_failed: AtomicU64,
    loads_cancelled: AtomicU64,
    loads_active: AtomicUsize,

    // === Decode metrics ===
    decodes_completed: AtomicU64,
    decodes_failed: AtomicU64,
    /// Decodes abandoned because the tile was cancelled or superseded.
    decodes_discarded: AtomicU64,

    // === Tile set metrics ===
    tiles_current: AtomicUsize,
    tiles_outdated: AtomicUsize,
    tiles_evicted: AtomicU64,
    notifications_sent: AtomicU64,
}

impl SourceMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            loads_requested: AtomicU64::new(0),
            loads_succeeded: AtomicU64::new(0),
            loads_failed: AtomicU64::new(0),
            loads_cancelled: AtomicU64::new(0),
            loads_active: AtomicUsize::new(0),
            decodes_completed: AtomicU64::new(0),
            decodes_failed: AtomicU64::new(0),
            decodes_discarded: AtomicU64::new(0),
            tiles_current: AtomicUsize::new(0),
            tiles_outdated: AtomicUsize::new(0),
            tiles_evicted: AtomicU64::new(0),
            notifications_sent: AtomicU64::new(0),
        }
    }

    // === Load tracking ===

    /// Record a tile load being queued.
    pub fn load_requested(&self) {
        self.loads_requested.fetch_add(1, Ordering::Relaxed);
        self.loads_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn load_succeeded(&self) {
        self.loads_succeeded.fetch_add(1, Ordering::Relaxed);
        self.finish_load();
    }

    pub fn load_failed(&self) {
        self.loads_failed.fetch_add(1, Ordering::Relaxed);
        self.finish_load();
    }

    pub fn load_cancelled(&self) {
        self.loads_cancelled.fetch_add(1, Ordering::Relaxed);
        self.finish_load();
    }

    fn finish_load(&self) {
        // Saturating: a cancel racing a completion must not wrap the gauge.
        let _ = self
            .loads_active
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |active| active.checked_sub(1));
    }

    // === Decode tracking ===

    pub fn decode_completed(&self) {
        self.decodes_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decode_failed(&self) {
        self.decodes_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decode_discarded(&self) {
        self.decodes_discarded.fetch_add(1, Ordering::Relaxed);
    }

    // === Tile set tracking ===

    /// Record the current sizes of the tile sets.
    pub fn set_tile_counts(&self, current: usize, outdated: usize) {
        self.tiles_current.store(current, Ordering::Relaxed);
        self.tiles_outdated.store(outdated, Ordering::Relaxed);
    }

    pub fn tiles_evicted(&self, count: usize) {
        self.tiles_evicted.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn notification_sent(&self) {
        self.notifications_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime: self.start_time.elapsed(),
            loads_requested: self.loads_requested.load(Ordering::Relaxed),
            loads_succeeded: self.loads_succeeded.load(Ordering::Relaxed),
            loads_failed: self.loads_failed.load(Ordering::Relaxed),
            loads_cancelled: self.loads_cancelled.load(Ordering::Relaxed),
            loads_active: self.loads_active.load(Ordering::Relaxed),
            decodes_completed: self.decodes_completed.load(Ordering::Relaxed),
            decodes_failed: self.decodes_failed.load(Ordering::Relaxed),
            decodes_discarded: self.decodes_discarded.load(Ordering::Relaxed),
            tiles_current: self.tiles_current.load(Ordering::Relaxed),
            tiles_outdated: self.tiles_outdated.load(Ordering::Relaxed),
            tiles_evicted: self.tiles_evicted.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
        }
    }
}

impl Default for SourceMetrics {
    fn default() -> Self {
        Self::new()
    }
}
