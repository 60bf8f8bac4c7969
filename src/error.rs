//! Session-level errors surfaced through the `on_error` callback.
//!
//! Every failure that ends a session is converted into a [`LoadError`]
//! exactly once. The type is `Clone` because one fetch outcome fans out to
//! every session waiting on the same key.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::cache::CacheError;
use crate::codec::CodecError;
use crate::download::DownloadError;

/// Terminal error for one request session.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// URL or target missing before `run`.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// What is missing or inconsistent.
        reason: String,
    },

    /// The URL is not an absolute http(s) URL.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The rejected URL string.
        url: String,
    },

    /// Fatal transport failure or non-retryable HTTP status.
    #[error("network error loading {url}: {message}")]
    Network {
        /// The URL being fetched.
        url: String,
        /// HTTP status when the server answered.
        status: Option<u16>,
        /// Description of the failure.
        message: String,
    },

    /// Upstream-timeout failures persisted through every attempt.
    #[error("timed out loading {url} after {attempts} attempt(s)")]
    TimeoutExceededRetries {
        /// The URL being fetched.
        url: String,
        /// Number of attempts made.
        attempts: u32,
    },

    /// Cache read or write failure.
    #[error("local IO error at {path}: {source}")]
    LocalIo {
        /// Path being accessed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The payload is not a decodable image.
    #[error("cannot decode image: {message}")]
    Decode {
        /// Codec failure description.
        message: String,
    },
}

/// Discriminant of [`LoadError`] for programmatic matching and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadErrorKind {
    InvalidConfiguration,
    InvalidUrl,
    Network,
    TimeoutExceededRetries,
    LocalIo,
    Decode,
}

impl LoadError {
    /// Creates an invalid configuration error.
    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Returns the error's kind.
    #[must_use]
    pub fn kind(&self) -> LoadErrorKind {
        match self {
            Self::InvalidConfiguration { .. } => LoadErrorKind::InvalidConfiguration,
            Self::InvalidUrl { .. } => LoadErrorKind::InvalidUrl,
            Self::Network { .. } => LoadErrorKind::Network,
            Self::TimeoutExceededRetries { .. } => LoadErrorKind::TimeoutExceededRetries,
            Self::LocalIo { .. } => LoadErrorKind::LocalIo,
            Self::Decode { .. } => LoadErrorKind::Decode,
        }
    }
}

impl From<DownloadError> for LoadError {
    fn from(error: DownloadError) -> Self {
        match error {
            DownloadError::RetriesExhausted { url, attempts, .. } => {
                Self::TimeoutExceededRetries { url, attempts }
            }
            DownloadError::HttpStatus { ref url, status } => Self::Network {
                url: url.clone(),
                status: Some(status),
                message: error.to_string(),
            },
            DownloadError::Network { ref url, .. }
            | DownloadError::Timeout { ref url }
            | DownloadError::Cancelled { ref url } => {
                Self::Network {
                    url: url.clone(),
                    status: None,
                    message: error.to_string(),
                }
            }
        }
    }
}

impl From<CacheError> for LoadError {
    fn from(error: CacheError) -> Self {
        match error {
            CacheError::Io { path, source } => Self::LocalIo {
                path,
                source: Arc::new(source),
            },
            CacheError::NotFound { ref key } => Self::LocalIo {
                path: PathBuf::from(key),
                source: Arc::new(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    error.to_string(),
                )),
            },
            CacheError::InvalidUrl { url } => Self::InvalidUrl { url },
        }
    }
}

impl From<CodecError> for LoadError {
    fn from(error: CodecError) -> Self {
        Self::Decode {
            message: error.to_string(),
        }
    }
}
