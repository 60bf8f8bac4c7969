//! `imgcache key`, `imgcache clear` and `imgcache clear-all`.

use anyhow::{Context, Result};
use imgcache_core::{CacheKey, ImageLoader};

/// Prints the key and entry path for `url`.
pub(crate) fn run_key_command(loader: &ImageLoader, url: &str) -> Result<()> {
    let key = CacheKey::from_url(url).with_context(|| format!("Cannot derive key for '{url}'"))?;
    println!("{key}\t{}", loader.cache().entry_path(&key).display());
    Ok(())
}

/// Removes the entry for `url`.
pub(crate) async fn run_clear_command(loader: &ImageLoader, url: &str) {
    loader.clear_cache(url).await;
}

/// Removes every cached file.
pub(crate) async fn run_clear_all_command(loader: &ImageLoader) {
    loader.clear_all_cached_files().await;
}
