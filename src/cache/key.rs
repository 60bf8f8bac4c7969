//! Deterministic cache keys derived from URLs.

use std::fmt;

use sha2::{Digest, Sha256};
use url::Url;

use super::CacheError;

/// Length of a key in hex characters (SHA-256).
const KEY_HEX_LEN: usize = 64;

/// Fixed-length key identifying one remote resource.
///
/// Two URLs that normalize to the same string always produce the same key,
/// across calls and across process restarts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derives the key for a raw URL string.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidUrl`] if the string is not an absolute URL.
    pub fn from_url(url: &str) -> Result<Self, CacheError> {
        let normalized = normalize_url(url)?;
        Ok(Self::from_normalized(&normalized))
    }

    /// Derives the key for an already-normalized URL.
    #[must_use]
    pub fn from_normalized(url: &Url) -> Self {
        let digest = Sha256::digest(url.as_str().as_bytes());
        Self(format!("{digest:x}"))
    }

    /// Returns the hex digest, which is also the entry's filename.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Parses and normalizes a URL for keying.
///
/// `url::Url` already lower-cases scheme and host, drops default ports and
/// resolves dot segments. The fragment is removed since it never reaches
/// the server.
///
/// # Errors
///
/// Returns [`CacheError::InvalidUrl`] if the string is not an absolute URL.
pub fn normalize_url(raw: &str) -> Result<Url, CacheError> {
    let trimmed = raw.trim();
    let mut url = Url::parse(trimmed).map_err(|_| CacheError::invalid_url(raw))?;
    url.set_fragment(None);
    Ok(url)
}
