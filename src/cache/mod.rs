//! Content-addressed on-disk cache for fetched image bytes.
//!
//! Every remote URL maps to a [`CacheKey`], a fixed-length hex digest of
//! the normalized URL. The key doubles as the in-flight registry key and
//! as the filename of the entry under the cache root:
//!
//! ```text
//! <cache-root>/<sha256-hex-of-normalized-url>
//! ```
//!
//! Entries hold the fetched bytes verbatim. There is no in-memory index;
//! the directory is the source of truth.
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use imgcache_core::cache::{CacheKey, CacheStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = CacheStore::new("./image-cache");
//! let key = CacheKey::from_url("https://example.com/cat.png")?;
//! store.write(&key, Bytes::from_static(b"raw bytes")).await?;
//! assert!(store.exists(&key).await);
//! # Ok(())
//! # }
//! ```

mod error;
mod key;
mod store;

pub use error::CacheError;
pub use key::{CacheKey, normalize_url};
pub use store::CacheStore;
