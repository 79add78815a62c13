//! Tile payload loaders.
//!
//! - [`Loader`]: fetches bytes (or textures) for a URL
//! - [`LoaderChain`]: ordered fallback over several loaders
//! - [`FileLoader`], [`HttpLoader`]: stock loaders

mod chain;
mod file;
mod http;
mod result;
mod traits;

pub use chain::{ChainOutcome, LoaderChain};
pub use file::{FileLoader, FILE_URL_PREFIX};
pub use http::{status_for, HttpLoader, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_USER_AGENT};
pub use result::{DataLoaderResult, LoaderResult, LoaderStatus, TextureHolder, TextureLoaderResult};
pub use traits::Loader;
