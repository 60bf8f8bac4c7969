//! The engine entry point.
//!
//! [`ImageLoader`] owns the process-wide collaborators every session
//! shares: the [`CacheStore`], the [`FetchCoordinator`], the
//! [`Downloader`], the codec and the presenter. It is cheap to clone.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::cache::{CacheKey, CacheStore};
use crate::codec::{ImageCodec, StandardCodec};
use crate::coordinator::FetchCoordinator;
use crate::download::constants::{CONNECT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use crate::download::{Downloader, HttpClient};
use crate::present::Presenter;
use crate::session::{ImageRequest, RequestSession, SessionTask};

/// Default delay between a session finishing and releasing its request.
pub const DEFAULT_RELEASE_DELAY: Duration = Duration::from_millis(500);

/// Directory name used under the platform cache directory.
const CACHE_DIR_NAME: &str = "imgcache";

/// Process-wide loader settings.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Directory holding cache entries.
    pub cache_root: PathBuf,
    /// Delay before a finished session releases its request.
    pub release_delay: Duration,
    /// TCP connect timeout for the HTTP client.
    pub connect_timeout_secs: u64,
    /// User-Agent header sent with every fetch.
    pub user_agent: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            cache_root: default_cache_root(),
            release_delay: DEFAULT_RELEASE_DELAY,
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl LoaderConfig {
    /// Default settings with the cache under `cache_root`.
    #[must_use]
    pub fn with_cache_root(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
            ..Self::default()
        }
    }
}

/// Resolves the default cache root.
///
/// `$XDG_CACHE_HOME/imgcache`, then `$HOME/.cache/imgcache`, then
/// `imgcache` under the system temp directory.
#[must_use]
pub fn default_cache_root() -> PathBuf {
    let non_empty = |name: &str| std::env::var_os(name).filter(|v| !v.is_empty());
    if let Some(xdg) = non_empty("XDG_CACHE_HOME") {
        return PathBuf::from(xdg).join(CACHE_DIR_NAME);
    }
    if let Some(home) = non_empty("HOME") {
        return PathBuf::from(home).join(".cache").join(CACHE_DIR_NAME);
    }
    std::env::temp_dir().join(CACHE_DIR_NAME)
}

struct LoaderInner {
    config: LoaderConfig,
    cache: CacheStore,
    coordinator: Arc<FetchCoordinator>,
    downloader: Downloader,
    codec: Arc<dyn ImageCodec>,
    presenter: Arc<dyn Presenter>,
}

/// Shared engine state and the public cache operations.
///
/// # Example
///
/// ```no_run
/// use imgcache_core::loader::{ImageLoader, LoaderConfig};
/// use imgcache_core::present::{ChannelPresenter, Target, TargetKind};
/// use imgcache_core::session::ImageRequest;
/// use std::sync::Arc;
///
/// # async fn example() {
/// let (presenter, mut presentations) = ChannelPresenter::new();
/// let loader = ImageLoader::new(LoaderConfig::default(), Arc::new(presenter));
///
/// let request = ImageRequest::builder()
///     .url("https://example.com/banner.png")
///     .target(Target::new("banner", TargetKind::Texture))
///     .build();
/// let report = loader.load(request).wait().await;
/// assert!(report.is_success());
/// assert!(presentations.recv().await.is_some());
/// # }
/// ```
#[derive(Clone)]
pub struct ImageLoader {
    inner: Arc<LoaderInner>,
}

impl fmt::Debug for ImageLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageLoader")
            .field("config", &self.inner.config)
            .field("in_flight", &self.inner.coordinator.len())
            .finish_non_exhaustive()
    }
}

impl ImageLoader {
    /// Creates a loader with the standard codec.
    #[must_use]
    pub fn new(config: LoaderConfig, presenter: Arc<dyn Presenter>) -> Self {
        Self::with_codec(config, Arc::new(StandardCodec::default()), presenter)
    }

    /// Creates a loader with a caller-supplied codec.
    #[must_use]
    pub fn with_codec(
        config: LoaderConfig,
        codec: Arc<dyn ImageCodec>,
        presenter: Arc<dyn Presenter>,
    ) -> Self {
        let client = HttpClient::with_settings(config.connect_timeout_secs, &config.user_agent);
        Self {
            inner: Arc::new(LoaderInner {
                cache: CacheStore::new(config.cache_root.clone()),
                coordinator: Arc::new(FetchCoordinator::new()),
                downloader: Downloader::new(client),
                codec,
                presenter,
                config,
            }),
        }
    }

    /// Creates an idle session for `request`.
    #[must_use]
    pub fn session(&self, request: ImageRequest) -> RequestSession {
        RequestSession::new(self.clone(), request)
    }

    /// Creates a session for `request` and runs it once.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn load(&self, request: ImageRequest) -> SessionTask {
        self.session(request).run()
    }

    /// Removes the cache entry for `url` and returns whether one was removed.
    ///
    /// Missing entries, invalid URLs and delete failures are logged and
    /// otherwise ignored.
    #[instrument(skip(self))]
    pub async fn clear_cache(&self, url: &str) -> bool {
        match CacheKey::from_url(url) {
            Ok(key) => {
                let removed = self.inner.cache.delete_one(&key).await;
                if removed {
                    info!(key = %key, "cleared cache entry");
                }
                removed
            }
            Err(e) => {
                warn!(error = %e, "cannot clear cache entry");
                false
            }
        }
    }

    /// Removes every cache entry under the cache root and returns whether
    /// the root was removed.
    pub async fn clear_all_cached_files(&self) -> bool {
        self.inner.cache.delete_all().await
    }

    /// Loader settings.
    #[must_use]
    pub fn config(&self) -> &LoaderConfig {
        &self.inner.config
    }

    /// The cache store.
    #[must_use]
    pub fn cache(&self) -> &CacheStore {
        &self.inner.cache
    }

    /// The in-flight fetch registry.
    #[must_use]
    pub fn coordinator(&self) -> &Arc<FetchCoordinator> {
        &self.inner.coordinator
    }

    pub(crate) fn downloader(&self) -> &Downloader {
        &self.inner.downloader
    }

    pub(crate) fn codec(&self) -> &Arc<dyn ImageCodec> {
        &self.inner.codec
    }

    pub(crate) fn presenter(&self) -> &Arc<dyn Presenter> {
        &self.inner.presenter
    }
}
