//! Source telemetry.
//!
//! Lock-free counters recorded by tile sources, and a serializable
//! point-in-time snapshot for logs and the CLI.
//!
//! # Architecture
//!
//! ```text
//! TiledSource ─────► SourceMetrics ─────► MetricsSnapshot ─────► CLI / logs
//!                   (atomic counters)    (point-in-time copy)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tileflow::telemetry::SourceMetrics;
//!
//! let metrics = Arc::new(SourceMetrics::new());
//! metrics.load_requested();
//! metrics.load_succeeded();
//!
//! let snapshot = metrics.snapshot();
//! println!("Loads completed: {}", snapshot.loads_succeeded);
//! ```

mod metrics;
mod snapshot;

pub use metrics::SourceMetrics;
pub use snapshot::MetricsSnapshot;
