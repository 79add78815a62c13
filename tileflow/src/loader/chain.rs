//! Ordered loader fallback.
//!
//! A [`LoaderChain`] tries its loaders in order and stops at the first
//! [`LoaderStatus::Ok`]. Both NOOP and failures fall through to the next
//! loader, so a local cache can sit in front of a network loader and a
//! fallback server can sit behind a failing one.
//!
//! When no loader succeeds, the chain reports the last failure it saw, or
//! NOOP if every loader declined.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, trace};

use super::result::{LoaderResult, LoaderStatus, TextureHolder};
use super::traits::Loader;

/// Result of running a chain, with the loader that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct ChainOutcome<T> {
    pub result: LoaderResult<T>,
    /// Index of the loader that succeeded, or of the last loader that
    /// failed. `None` when every loader returned NOOP.
    pub loader_index: Option<usize>,
}

impl<T> ChainOutcome<T> {
    fn exhausted() -> Self {
        Self {
            result: LoaderResult::noop(),
            loader_index: None,
        }
    }

    pub fn status(&self) -> LoaderStatus {
        self.result.status
    }
}

#[derive(Clone, Default)]
pub struct LoaderChain {
    loaders: Vec<Arc<dyn Loader>>,
}

impl LoaderChain {
    pub fn new(loaders: Vec<Arc<dyn Loader>>) -> Self {
        Self { loaders }
    }

    pub fn push(&mut self, loader: Arc<dyn Loader>) {
        self.loaders.push(loader);
    }

    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<dyn Loader>> {
        self.loaders.get(index)
    }

    pub fn load_data(&self, url: &str, etag: Option<&str>) -> ChainOutcome<Bytes> {
        self.load_data_from(0, url, etag)
    }

    /// Runs the chain starting at loader `start`.
    pub fn load_data_from(
        &self,
        start: usize,
        url: &str,
        etag: Option<&str>,
    ) -> ChainOutcome<Bytes> {
        run_chain(&self.loaders, start, url, |loader| loader.load_data(url, etag))
    }

    pub fn load_texture(&self, url: &str, etag: Option<&str>) -> ChainOutcome<TextureHolder> {
        run_chain(&self.loaders, 0, url, |loader| loader.load_texture(url, etag))
    }

    /// Asynchronous [`load_data`](Self::load_data); loaders are awaited one
    /// at a time in chain order.
    pub async fn load_data_async(&self, url: &str, etag: Option<&str>) -> ChainOutcome<Bytes> {
        let mut terminal: Option<ChainOutcome<Bytes>> = None;
        for (index, loader) in self.loaders.iter().enumerate() {
            let result = Arc::clone(loader)
                .load_data_async(url.to_string(), etag.map(str::to_string))
                .await;
            match result.status {
                LoaderStatus::Ok => {
                    return ChainOutcome {
                        result,
                        loader_index: Some(index),
                    }
                }
                LoaderStatus::Noop => trace!(url, loader = loader.name(), "Loader declined"),
                status => {
                    debug!(url, loader = loader.name(), %status, "Loader failed, trying next");
                    terminal = Some(ChainOutcome {
                        result,
                        loader_index: Some(index),
                    });
                }
            }
        }
        terminal.unwrap_or_else(ChainOutcome::exhausted)
    }

    /// Asks one loader to abandon `url`.
    pub fn cancel(&self, loader_index: usize, url: &str) {
        if let Some(loader) = self.loaders.get(loader_index) {
            loader.cancel(url);
        }
    }

    /// Asks every loader to abandon `url`.
    pub fn cancel_all(&self, url: &str) {
        for loader in &self.loaders {
            loader.cancel(url);
        }
    }
}

impl std::fmt::Debug for LoaderChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.loaders.iter().map(|loader| loader.name()).collect();
        f.debug_struct("LoaderChain").field("loaders", &names).finish()
    }
}

fn run_chain<T>(
    loaders: &[Arc<dyn Loader>],
    start: usize,
    url: &str,
    mut load: impl FnMut(&dyn Loader) -> LoaderResult<T>,
) -> ChainOutcome<T> {
    let mut terminal: Option<ChainOutcome<T>> = None;
    let mut cursor = start;
    while let Some(loader) = loaders.get(cursor) {
        let result = load(loader.as_ref());
        match result.status {
            LoaderStatus::Ok => {
                return ChainOutcome {
                    result,
                    loader_index: Some(cursor),
                }
            }
            LoaderStatus::Noop => trace!(url, loader = loader.name(), "Loader declined"),
            status => {
                debug!(url, loader = loader.name(), %status, "Loader failed, trying next");
                terminal = Some(ChainOutcome {
                    result,
                    loader_index: Some(cursor),
                });
            }
        }
        cursor += 1;
    }
    terminal.unwrap_or_else(ChainOutcome::exhausted)
}
