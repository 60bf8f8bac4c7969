//! Error types for the cache module.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by [`CacheStore`](super::CacheStore) and key derivation.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The URL could not be parsed into an absolute URL.
    #[error("cannot derive cache key from invalid URL: {url}")]
    InvalidUrl {
        /// The rejected URL string.
        url: String,
    },

    /// No entry exists for the requested key.
    #[error("no cache entry for key {key}")]
    NotFound {
        /// Hex digest of the missing key.
        key: String,
    },

    /// File system error while touching the cache directory.
    #[error("cache IO error at {path}: {source}")]
    Io {
        /// The path being read, written or removed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl CacheError {
    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a not-found error for the given key digest.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true when the error means the entry is simply absent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            Self::InvalidUrl { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_error_io_display_contains_path() {
        let error = CacheError::io(
            "/tmp/cache/abc",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = error.to_string();
        assert!(msg.contains("/tmp/cache/abc"), "Expected path in: {msg}");
        assert!(!error.is_not_found());
    }

    #[test]
    fn test_cache_error_io_not_found_kind_is_not_found() {
        let error = CacheError::io(
            "/tmp/cache/abc",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(error.is_not_found());
        assert!(CacheError::not_found("abc").is_not_found());
    }

    #[test]
    fn test_cache_error_invalid_url_display() {
        let msg = CacheError::invalid_url("not a url").to_string();
        assert!(msg.contains("not a url"), "Expected URL in: {msg}");
    }
}
