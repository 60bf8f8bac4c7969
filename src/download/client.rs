//! HTTP client wrapper performing a single streamed fetch attempt.

use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::CONTENT_LENGTH;
use tracing::{debug, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use super::error::DownloadError;

/// HTTP client for fetching image payloads into memory.
///
/// Create once and share; clones reuse the same connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a client with the default connect timeout and User-Agent.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(CONNECT_TIMEOUT_SECS, DEFAULT_USER_AGENT)
    }

    /// Creates a client with an explicit connect timeout and User-Agent.
    ///
    /// There is no overall request timeout here; the
    /// [`Downloader`](super::Downloader) bounds each attempt itself.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_settings(connect_timeout_secs: u64, user_agent: &str) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .gzip(true)
            .user_agent(user_agent)
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Performs one GET and streams the body into memory.
    ///
    /// `on_chunk(bytes_read, total)` runs after every received chunk; `total`
    /// is `None` until the server announces a Content-Length.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::HttpStatus`] for non-success responses,
    /// [`DownloadError::Timeout`] when reqwest reports a timeout, and
    /// [`DownloadError::Network`] for any other transport failure.
    #[instrument(skip(self, on_chunk), fields(url = %url))]
    pub async fn fetch_attempt(
        &self,
        url: &Url,
        on_chunk: &mut (dyn FnMut(u64, Option<u64>) + Send),
    ) -> Result<Bytes, DownloadError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| map_reqwest_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url.as_str(), status.as_u16()));
        }

        let total = content_length(&response);
        debug!(?total, "response headers received");

        let capacity = total
            .and_then(|t| usize::try_from(t).ok())
            .unwrap_or(0)
            .min(64 * 1024 * 1024);
        let mut body = Vec::with_capacity(capacity);
        let mut stream = response.bytes_stream();

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| map_reqwest_error(url, e))?;
            body.extend_from_slice(&chunk);
            on_chunk(body.len() as u64, total);
        }

        Ok(Bytes::from(body))
    }
}

fn map_reqwest_error(url: &Url, error: reqwest::Error) -> DownloadError {
    if error.is_timeout() {
        DownloadError::timeout(url.as_str())
    } else {
        DownloadError::network(url.as_str(), error)
    }
}

fn content_length(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|len| *len > 0)
}
