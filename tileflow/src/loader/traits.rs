//! The loader trait.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

use super::result::{DataLoaderResult, LoaderResult, TextureLoaderResult};

/// Fetches raw tile payloads for a URL.
///
/// Loaders are tried in order by a [`LoaderChain`](super::LoaderChain). A
/// loader that does not handle a URL returns [`LoaderStatus::Noop`](super::LoaderStatus::Noop).
pub trait Loader: Send + Sync + 'static {
    /// Short name for logs.
    fn name(&self) -> &str {
        "loader"
    }

    fn load_data(&self, url: &str, etag: Option<&str>) -> DataLoaderResult;

    /// Loads a decoded image. Loaders without texture support return NOOP.
    fn load_texture(&self, _url: &str, _etag: Option<&str>) -> TextureLoaderResult {
        LoaderResult::noop()
    }

    /// Asynchronous [`load_data`](Loader::load_data).
    ///
    /// The default runs the blocking call when polled; loaders with a native
    /// async client override it.
    fn load_data_async(
        self: Arc<Self>,
        url: String,
        etag: Option<String>,
    ) -> BoxFuture<'static, DataLoaderResult> {
        async move { self.load_data(&url, etag.as_deref()) }.boxed()
    }

    fn load_texture_async(
        self: Arc<Self>,
        url: String,
        etag: Option<String>,
    ) -> BoxFuture<'static, TextureLoaderResult> {
        async move { self.load_texture(&url, etag.as_deref()) }.boxed()
    }

    /// Abandons an in-flight load of `url`, if the loader supports it.
    fn cancel(&self, _url: &str) {}
}
