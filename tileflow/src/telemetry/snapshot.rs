//! Point-in-time telemetry snapshot.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// An immutable copy of [`SourceMetrics`](super::SourceMetrics).
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    #[serde(serialize_with = "serialize_millis")]
    pub uptime: Duration,

    // === Load metrics ===
    pub loads_requested: u64,
    pub loads_succeeded: u64,
    pub loads_failed: u64,
    pub loads_cancelled: u64,
    pub loads_active: usize,

    // === Decode metrics ===
    pub decodes_completed: u64,
    pub decodes_failed: u64,
    pub decodes_discarded: u64,

    // === Tile set metrics ===
    pub tiles_current: usize,
    pub tiles_outdated: usize,
    pub tiles_evicted: u64,
    pub notifications_sent: u64,
}

impl MetricsSnapshot {
    /// Fraction of finished loads that succeeded (0.0 - 1.0).
    pub fn load_success_rate(&self) -> f64 {
        let finished = self.loads_succeeded + self.loads_failed;
        if finished == 0 {
            0.0
        } else {
            self.loads_succeeded as f64 / finished as f64
        }
    }
}

fn serialize_millis<S: serde::Serializer>(
    duration: &Duration,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "uptime:        {:.1}s", self.uptime.as_secs_f64())?;
        writeln!(
            f,
            "loads:         {} requested, {} ok, {} failed, {} cancelled, {} active",
            self.loads_requested,
            self.loads_succeeded,
            self.loads_failed,
            self.loads_cancelled,
            self.loads_active
        )?;
        writeln!(
            f,
            "decodes:       {} ok, {} failed, {} discarded",
            self.decodes_completed, self.decodes_failed, self.decodes_discarded
        )?;
        write!(
            f,
            "tiles:         {} current, {} outdated, {} evicted, {} notifications",
            self.tiles_current, self.tiles_outdated, self.tiles_evicted, self.notifications_sent
        )
    }
}
