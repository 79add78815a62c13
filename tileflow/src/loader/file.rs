//! Loader that serves tiles from a local directory.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use tracing::trace;

use super::result::{DataLoaderResult, LoaderResult, LoaderStatus};
use super::traits::Loader;
use crate::error::LoaderError;

/// URL scheme prefix accepted (and stripped) by [`FileLoader`].
pub const FILE_URL_PREFIX: &str = "file://";

/// Reads tile payloads from files under a root directory.
///
/// URLs are resolved relative to the root, with an optional `file://`
/// prefix. URLs with another scheme are declined (NOOP) so the loader can
/// sit in front of a network loader as a local cache. Missing files are
/// reported as 404 unless [`with_missing_as_noop`](Self::with_missing_as_noop)
/// is set, in which case later loaders get a chance.
#[derive(Clone, Debug)]
pub struct FileLoader {
    root: PathBuf,
    missing_as_noop: bool,
}

impl FileLoader {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, LoaderError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(LoaderError::InvalidRoot(root));
        }
        Ok(Self {
            root,
            missing_as_noop: false,
        })
    }

    pub fn with_missing_as_noop(mut self, missing_as_noop: bool) -> Self {
        self.missing_as_noop = missing_as_noop;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a URL to a path under the root, or `None` for URLs this loader
    /// does not serve.
    fn resolve(&self, url: &str) -> Option<Result<PathBuf, ()>> {
        let relative = match url.strip_prefix(FILE_URL_PREFIX) {
            Some(rest) => rest,
            None if url.contains("://") => return None,
            None => url,
        };
        let relative = Path::new(relative.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Some(Err(()));
        }
        Some(Ok(self.root.join(relative)))
    }
}

impl Loader for FileLoader {
    fn name(&self) -> &str {
        "file"
    }

    fn load_data(&self, url: &str, _etag: Option<&str>) -> DataLoaderResult {
        let path = match self.resolve(url) {
            None => return LoaderResult::noop(),
            Some(Err(())) => {
                let message = Some("path escapes loader root".to_string());
                return LoaderResult::error(LoaderStatus::Error400, message);
            }
            Some(Ok(path)) => path,
        };

        match fs::read(&path) {
            Ok(contents) => {
                trace!(path = %path.display(), bytes = contents.len(), "Read tile file");
                LoaderResult::ok(Bytes::from(contents))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if self.missing_as_noop {
                    LoaderResult::noop()
                } else {
                    LoaderResult::error(LoaderStatus::Error404, Some("404".to_string()))
                }
            }
            Err(e) => LoaderResult::error(LoaderStatus::ErrorOther, Some(e.kind().to_string())),
        }
    }
}
