//! Per-source runtime settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::tile::ZoomInfo;

/// How long replaced tiles stay visible while their replacements load.
pub const DEFAULT_OUTDATED_TILE_TIMEOUT_MS: u64 = 5_000;

/// Settings for one [`TiledSource`](crate::source::TiledSource).
///
/// Optional fields override the layer's [`ZoomInfo`](crate::tile::ZoomInfo)
/// when set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Coarsest zoom identifier the source will request.
    pub min_zoom_level_identifier: Option<i32>,
    /// Finest zoom identifier the source will request.
    pub max_zoom_level_identifier: Option<i32>,
    pub num_draw_previous_layers: Option<i32>,
    pub underzoom: Option<bool>,
    pub overzoom: Option<bool>,
    pub outdated_tile_timeout_ms: u64,
    /// Per-queue bound on the source's mailbox; unbounded when `None`.
    pub mailbox_capacity: Option<usize>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            min_zoom_level_identifier: None,
            max_zoom_level_identifier: None,
            num_draw_previous_layers: None,
            underzoom: None,
            overzoom: None,
            outdated_tile_timeout_ms: DEFAULT_OUTDATED_TILE_TIMEOUT_MS,
            mailbox_capacity: None,
        }
    }
}

impl SourceConfig {
    pub fn outdated_tile_timeout(&self) -> Duration {
        Duration::from_millis(self.outdated_tile_timeout_ms)
    }

    pub fn with_zoom_range(mut self, min: Option<i32>, max: Option<i32>) -> Self {
        self.min_zoom_level_identifier = min;
        self.max_zoom_level_identifier = max;
        self
    }

    pub fn with_outdated_tile_timeout(mut self, timeout: Duration) -> Self {
        self.outdated_tile_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = Some(capacity);
        self
    }

    /// The layer's zoom settings with this config's overrides applied.
    pub fn resolve_zoom_info(&self, mut zoom_info: ZoomInfo) -> ZoomInfo {
        if let Some(previous) = self.num_draw_previous_layers {
            zoom_info.num_draw_previous_layers = previous;
        }
        if let Some(underzoom) = self.underzoom {
            zoom_info.underzoom = underzoom;
        }
        if let Some(overzoom) = self.overzoom {
            zoom_info.overzoom = overzoom;
        }
        zoom_info
    }
}
