//! Flat-directory storage of cache entries.

use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::{debug, info, instrument, warn};

use super::{CacheError, CacheKey};

/// Prefix for in-progress writes; never a valid key.
const TEMP_PREFIX: &str = ".tmp.";

/// Local-disk cache rooted at a single flat directory.
///
/// No locking happens here. At most one writer per key exists because the
/// [`FetchCoordinator`](crate::coordinator::FetchCoordinator) hands out a
/// single owner per key, and writes land through a temp file plus rename so
/// readers never observe a partial entry.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    /// Creates a store rooted at `root`. The directory is created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the cache root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the on-disk path of the entry for `key`.
    #[must_use]
    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.as_str())
    }

    /// Creates the cache root if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the directory cannot be created.
    pub async fn ensure_root(&self) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| CacheError::io(self.root.clone(), e))
    }

    /// Returns true iff an entry file is present for `key`.
    pub async fn exists(&self, key: &CacheKey) -> bool {
        tokio::fs::metadata(self.entry_path(key))
            .await
            .is_ok_and(|meta| meta.is_file())
    }

    /// Reads the full entry for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::NotFound`] if no entry exists, or
    /// [`CacheError::Io`] for any other read failure.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn read(&self, key: &CacheKey) -> Result<Bytes, CacheError> {
        let path = self.entry_path(key);
        match tokio::fs::read(&path).await {
            Ok(data) => {
                debug!(bytes = data.len(), "cache read");
                Ok(Bytes::from(data))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CacheError::not_found(key.as_str()))
            }
            Err(e) => Err(CacheError::io(path, e)),
        }
    }

    /// Writes `data` as the entry for `key`, replacing any previous entry.
    ///
    /// The bytes go to a temp file in the cache root which is then renamed
    /// over the entry path. The cache root is created on first use. The file
    /// work runs on the blocking pool and finishes even if this future is
    /// dropped; the temp file is removed unless the rename happened.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the directory, temp file or rename fails.
    #[instrument(skip(self, data), fields(key = %key, bytes = data.len()))]
    pub async fn write(&self, key: &CacheKey, data: Bytes) -> Result<(), CacheError> {
        self.ensure_root().await?;

        let root = self.root.clone();
        let path = self.entry_path(key);
        let target = path.clone();
        tokio::task::spawn_blocking(move || persist_entry(&root, &target, &data))
            .await
            .map_err(|e| CacheError::io(path.clone(), std::io::Error::other(e)))??;

        debug!(path = %path.display(), "cache entry written");
        Ok(())
    }

    /// Removes the entry for `key` and returns whether a file was removed.
    ///
    /// A missing entry is not a failure. Other failures are logged, never
    /// returned.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn delete_one(&self, key: &CacheKey) -> bool {
        let path = self.entry_path(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "cache entry deleted");
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "cache entry already absent");
                false
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to delete cache entry");
                false
            }
        }
    }

    /// Recursively removes the cache root and returns whether it was removed.
    ///
    /// Failures are logged, never returned.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub async fn delete_all(&self) -> bool {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => {
                info!("cache cleared");
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("cache root already absent");
                false
            }
            Err(e) => {
                warn!(error = %e, "failed to clear cache root");
                false
            }
        }
    }
}

fn persist_entry(root: &Path, path: &Path, data: &[u8]) -> Result<(), CacheError> {
    let mut tmp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(root)
        .map_err(|e| CacheError::io(root, e))?;
    tmp.write_all(data)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| CacheError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| CacheError::io(path, e.error))?;
    Ok(())
}
