//! HTTP loader backed by a blocking reqwest client.

use std::time::Duration;

use bytes::Bytes;
use reqwest::blocking::Client;
use reqwest::header::{ETAG, IF_NONE_MATCH};
use reqwest::StatusCode;
use tracing::{debug, trace};

use super::result::{DataLoaderResult, LoaderResult, LoaderStatus};
use super::traits::Loader;
use crate::error::LoaderError;

/// Default request timeout in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

pub const DEFAULT_USER_AGENT: &str = concat!("tileflow/", env!("CARGO_PKG_VERSION"));

/// Fetches tiles over HTTP(S).
///
/// Relative URLs are joined to the configured base URL. Loads run on the
/// calling thread, which is a scheduler worker in normal operation.
pub struct HttpLoader {
    client: Client,
    base_url: Option<String>,
}

impl HttpLoader {
    pub fn new(timeout: Duration) -> Result<Self, LoaderError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: None,
        })
    }

    pub fn with_defaults() -> Result<Self, LoaderError> {
        Self::new(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    fn full_url(&self, url: &str) -> Option<String> {
        if url.starts_with("http://") || url.starts_with("https://") {
            return Some(url.to_string());
        }
        if url.contains("://") {
            return None;
        }
        self.base_url
            .as_ref()
            .map(|base| format!("{}/{}", base.trim_end_matches('/'), url.trim_start_matches('/')))
    }
}

/// Maps an HTTP status to a loader status.
pub fn status_for(code: StatusCode) -> LoaderStatus {
    match code {
        code if code.is_success() => LoaderStatus::Ok,
        StatusCode::NOT_MODIFIED => LoaderStatus::Noop,
        StatusCode::BAD_REQUEST => LoaderStatus::Error400,
        StatusCode::NOT_FOUND | StatusCode::GONE => LoaderStatus::Error404,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => LoaderStatus::ErrorTimeout,
        _ => LoaderStatus::ErrorOther,
    }
}

fn status_for_error(error: &reqwest::Error) -> LoaderStatus {
    if error.is_timeout() {
        LoaderStatus::ErrorTimeout
    } else if error.is_connect() || error.is_request() {
        LoaderStatus::ErrorNetwork
    } else {
        LoaderStatus::ErrorOther
    }
}

impl Loader for HttpLoader {
    fn name(&self) -> &str {
        "http"
    }

    fn load_data(&self, url: &str, etag: Option<&str>) -> DataLoaderResult {
        let Some(full_url) = self.full_url(url) else {
            return LoaderResult::noop();
        };

        let mut request = self.client.get(&full_url);
        if let Some(etag) = etag {
            request = request.header(IF_NONE_MATCH, etag);
        }

        let response = match request.send() {
            Ok(response) => response,
            Err(e) => {
                debug!(url = %full_url, error = %e, "HTTP request failed");
                return LoaderResult::error(status_for_error(&e), Some(e.to_string()));
            }
        };

        let code = response.status();
        let status = status_for(code);
        if !status.is_ok() {
            trace!(url = %full_url, %code, "HTTP non-success response");
            return match status {
                LoaderStatus::Noop => LoaderResult::noop(),
                _ => LoaderResult::error(status, Some(code.as_u16().to_string())),
            };
        }

        let response_etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        match response.bytes() {
            Ok(body) => LoaderResult::ok(Bytes::from(body.to_vec())).with_etag(response_etag),
            Err(e) => LoaderResult::error(status_for_error(&e), Some(e.to_string())),
        }
    }
}

impl std::fmt::Debug for HttpLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpLoader").field("base_url", &self.base_url).finish()
    }
}
