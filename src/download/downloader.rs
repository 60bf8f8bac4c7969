//! Bounded-retry fetch of one URL with progress reporting.
//!
//! Each attempt walks `Connecting -> Streaming -> Complete | Failed` under
//! its own time budget. Failed attempts are classified by
//! [`classify_error`]; only gateway timeouts (HTTP 504) are retried.

use std::time::Duration;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::client::HttpClient;
use super::constants::STREAMING_PROGRESS_CAP;
use super::error::DownloadError;
use super::retry::{FailureType, RetryDecision, RetryPolicy, classify_error};

/// Payload returned by a successful [`Downloader::fetch`].
#[derive(Debug, Clone)]
pub struct FetchedPayload {
    /// The complete response body.
    pub bytes: Bytes,
    /// Attempts used, including the successful one.
    pub attempts: u32,
}

/// Performs network retrieval for one key at a time.
///
/// Persisting the payload is the caller's job.
#[derive(Debug, Clone, Default)]
pub struct Downloader {
    client: HttpClient,
}

impl Downloader {
    /// Creates a downloader on top of `client`.
    #[must_use]
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// Fetches `url`, retrying HTTP 504 responses per `policy`.
    ///
    /// `on_progress` receives whole percentages, non-decreasing within an
    /// attempt and never above 99. Nothing is reported once `cancel` fires.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::RetriesExhausted`] when every attempt got HTTP 504
    /// - [`DownloadError::Timeout`] when an attempt ran past `attempt_timeout`
    /// - [`DownloadError::Cancelled`] when `cancel` fired
    /// - the first fatal [`DownloadError`] otherwise
    #[instrument(skip(self, policy, on_progress, cancel), fields(url = %url, max_attempts = policy.max_attempts()))]
    pub async fn fetch(
        &self,
        url: &Url,
        attempt_timeout: Duration,
        policy: &RetryPolicy,
        on_progress: &(dyn Fn(u8) + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<FetchedPayload, DownloadError> {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!(attempt, "connecting");

            let mut progress = ProgressTracker::default();
            let mut on_chunk = |read: u64, total: Option<u64>| {
                if cancel.is_cancelled() {
                    return;
                }
                on_progress(progress.update(read, total));
            };

            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(DownloadError::cancelled(url.as_str())),
                timed = tokio::time::timeout(
                    attempt_timeout,
                    self.client.fetch_attempt(url, &mut on_chunk),
                ) => timed.unwrap_or_else(|_| Err(DownloadError::timeout(url.as_str()))),
            };

            let error = match outcome {
                Ok(bytes) => {
                    info!(attempt, bytes = bytes.len(), "download complete");
                    return Ok(FetchedPayload {
                        bytes,
                        attempts: attempt,
                    });
                }
                Err(error) => error,
            };

            let failure_type = classify_error(&error);
            match policy.should_retry(failure_type, attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next_attempt,
                } => {
                    warn!(
                        attempt = next_attempt,
                        max_attempts = policy.max_attempts(),
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "retrying download"
                    );
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(DownloadError::cancelled(url.as_str())),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(%reason, attempt, "not retrying download");
                    return Err(match failure_type {
                        FailureType::Transient => {
                            DownloadError::retries_exhausted(url.as_str(), attempt, error)
                        }
                        FailureType::Fatal => error,
                    });
                }
            }
        }
    }
}

/// Turns byte counts into a capped, non-decreasing percentage.
#[derive(Debug, Default)]
struct ProgressTracker {
    last: u8,
}

impl ProgressTracker {
    #[allow(clippy::cast_possible_truncation)]
    fn update(&mut self, read: u64, total: Option<u64>) -> u8 {
        let percent = match total {
            Some(total) if total > 0 => {
                let raw = u128::from(read) * 100 / u128::from(total);
                raw.min(u128::from(STREAMING_PROGRESS_CAP)) as u8
            }
            _ => 0,
        };
        self.last = self.last.max(percent);
        self.last
    }
}
