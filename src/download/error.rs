//! Error types for the download module.
//!
//! This module defines structured errors for network retrieval,
//! carrying the URL in every variant for context-rich messages.

use thiserror::Error;

/// Errors that can occur while fetching a remote resource.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The attempt exceeded its time budget.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Every allowed attempt was answered with HTTP 504.
    #[error("giving up on {url} after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// The URL being fetched.
        url: String,
        /// Total attempts made.
        attempts: u32,
        /// The failure of the final attempt.
        #[source]
        last: Box<DownloadError>,
    },

    /// The owning session was torn down mid-download.
    #[error("download of {url} cancelled")]
    Cancelled {
        /// The URL being fetched.
        url: String,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Wraps the final failure once retries are used up.
    pub fn retries_exhausted(url: impl Into<String>, attempts: u32, last: DownloadError) -> Self {
        Self::RetriesExhausted {
            url: url.into(),
            attempts,
            last: Box::new(last),
        }
    }

    /// Creates a cancellation error.
    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::Cancelled { url: url.into() }
    }
}

// No `From<reqwest::Error>`: every variant needs the URL, which the source
// error does not reliably carry.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_error_timeout_display() {
        let error = DownloadError::timeout("https://example.com/a.png");
        assert!(error.to_string().contains("timeout"));
        assert!(error.to_string().contains("https://example.com/a.png"));
    }

    #[test]
    fn test_download_error_http_status_display() {
        let error = DownloadError::http_status("https://example.com/a.png", 504);
        let msg = error.to_string();
        assert!(msg.contains("504"), "Expected '504' in: {msg}");
        assert!(
            msg.contains("https://example.com/a.png"),
            "Expected URL in: {msg}"
        );
    }

    #[test]
    fn test_download_error_retries_exhausted_display_includes_last_failure() {
        let error = DownloadError::retries_exhausted(
            "https://example.com/a.png",
            3,
            DownloadError::http_status("https://example.com/a.png", 504),
        );
        let msg = error.to_string();
        assert!(msg.contains("3 attempts"), "Expected attempts in: {msg}");
        assert!(msg.contains("HTTP 504"), "Expected last failure in: {msg}");
    }

    #[test]
    fn test_download_error_cancelled_display() {
        let msg = DownloadError::cancelled("https://example.com/a.png").to_string();
        assert!(msg.contains("cancelled"), "Expected 'cancelled' in: {msg}");
    }
}
