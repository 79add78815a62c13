//! Tile payload decoding.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::error::DecodeError;
use crate::tile::TileInfo;

/// Tiles with a load in flight, mapped to the version of that load.
pub(crate) type LoadingTiles = Arc<Mutex<HashMap<TileInfo, u64>>>;

/// Lets a decoder check whether its result is still wanted.
///
/// A load is cancelled once its tile leaves the loading set or is reloaded
/// under a newer version. Decoders doing long work should poll
/// [`is_cancelled`](CancelProbe::is_cancelled) and return `Ok(None)` early.
#[derive(Clone)]
pub struct CancelProbe {
    loading: LoadingTiles,
    tile: TileInfo,
    version: u64,
}

impl CancelProbe {
    pub(crate) fn new(loading: LoadingTiles, tile: TileInfo, version: u64) -> Self {
        Self { loading, tile, version }
    }

    /// A probe that reports "not cancelled" until dropped, for driving a
    /// decoder outside a source.
    pub fn detached(tile: TileInfo) -> Self {
        let loading: LoadingTiles = Arc::new(Mutex::new(HashMap::from([(tile, 0)])));
        Self::new(loading, tile, 0)
    }

    pub fn is_cancelled(&self) -> bool {
        self.loading.lock().get(&self.tile) != Some(&self.version)
    }

    pub fn tile(&self) -> &TileInfo {
        &self.tile
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}

impl std::fmt::Debug for CancelProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelProbe")
            .field("tile", &self.tile)
            .field("version", &self.version)
            .finish()
    }
}

/// Turns raw loader output into the value a source publishes.
pub trait TileDecoder: Send + Sync + 'static {
    type Output: Send + Sync + 'static;

    /// Whether decoding is expensive enough to run as its own scheduler task
    /// instead of inline on the source's mailbox.
    fn has_expensive_post_loading_task(&self) -> bool;

    /// Decodes `payload` for `tile`.
    ///
    /// Returns `Ok(None)` when cancelled (see [`CancelProbe`]) or when the
    /// tile legitimately has no content.
    fn decode(
        &self,
        payload: Bytes,
        tile: &TileInfo,
        probe: &CancelProbe,
    ) -> Result<Option<Self::Output>, DecodeError>;
}

/// Runs `decoder`, reporting a panic as [`DecodeError::Malformed`].
///
/// A source must always hear back from a decode, otherwise the tile would
/// stay in its loading set.
pub(crate) fn decode_guarded<D: TileDecoder>(
    decoder: &D,
    payload: Bytes,
    tile: &TileInfo,
    probe: &CancelProbe,
) -> Result<Option<D::Output>, DecodeError> {
    panic::catch_unwind(AssertUnwindSafe(|| decoder.decode(payload, tile, probe)))
        .unwrap_or_else(|cause| {
            Err(DecodeError::Malformed(format!(
                "decoder panicked: {}",
                panic_message(cause.as_ref())
            )))
        })
}

fn panic_message(cause: &(dyn Any + Send)) -> &str {
    if let Some(message) = cause.downcast_ref::<&str>() {
        message
    } else if let Some(message) = cause.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Publishes the raw payload unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct BytesDecoder;

impl TileDecoder for BytesDecoder {
    type Output = Bytes;

    fn has_expensive_post_loading_task(&self) -> bool {
        false
    }

    fn decode(
        &self,
        payload: Bytes,
        _tile: &TileInfo,
        probe: &CancelProbe,
    ) -> Result<Option<Bytes>, DecodeError> {
        if probe.is_cancelled() {
            return Ok(None);
        }
        Ok(Some(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::RectCoord;

    fn tile() -> TileInfo {
        TileInfo::new(RectCoord::from_corners(0.0, 0.0, 1.0, 1.0), 0, 0, 0, 0, 0)
    }

    #[test]
    fn test_probe_tracks_version() {
        let loading: LoadingTiles = Arc::new(Mutex::new(HashMap::new()));
        let probe = CancelProbe::new(Arc::clone(&loading), tile(), 2);
        assert!(probe.is_cancelled());

        loading.lock().insert(tile(), 2);
        assert!(!probe.is_cancelled());

        loading.lock().insert(tile(), 3);
        assert!(probe.is_cancelled());
    }

    #[test]
    fn test_detached_probe() {
        assert!(!CancelProbe::detached(tile()).is_cancelled());
    }

    #[test]
    fn test_bytes_decoder_passes_through() {
        let payload = Bytes::from_static(b"abc");
        let probe = CancelProbe::detached(tile());
        let decoded = BytesDecoder.decode(payload.clone(), &tile(), &probe);
        assert_eq!(decoded, Ok(Some(payload)));
    }

    struct PanickingDecoder;

    impl TileDecoder for PanickingDecoder {
        type Output = Bytes;

        fn has_expensive_post_loading_task(&self) -> bool {
            false
        }

        fn decode(
            &self,
            _payload: Bytes,
            tile: &TileInfo,
            _probe: &CancelProbe,
        ) -> Result<Option<Bytes>, DecodeError> {
            panic!("bad header in {}", tile);
        }
    }

    #[test]
    fn test_guarded_decode_reports_panic_as_malformed() {
        let probe = CancelProbe::detached(tile());
        let decoded = decode_guarded(&PanickingDecoder, Bytes::new(), &tile(), &probe);
        match decoded {
            Err(DecodeError::Malformed(message)) => {
                assert!(message.starts_with("decoder panicked: bad header in"));
            }
            other => panic!("expected a malformed error, got {:?}", other),
        }
    }

    #[test]
    fn test_guarded_decode_passes_results_through() {
        let payload = Bytes::from_static(b"abc");
        let probe = CancelProbe::detached(tile());
        let decoded = decode_guarded(&BytesDecoder, payload.clone(), &tile(), &probe);
        assert_eq!(decoded, Ok(Some(payload)));
    }
}
