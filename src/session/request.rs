//! Immutable request configuration and its builder.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use url::Url;

use crate::cache::{CacheKey, normalize_url};
use crate::codec::DecodedImage;
use crate::download::RetryPolicy;
use crate::download::constants::{
    DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BASE_DELAY,
};
use crate::error::LoadError;
use crate::present::{FadeCurve, Target, Transition};

type Hook = Arc<dyn Fn() + Send + Sync>;
type ProgressHook = Arc<dyn Fn(u8) + Send + Sync>;
type LoadedHook = Arc<dyn Fn(&DecodedImage) + Send + Sync>;
type ErrorHook = Arc<dyn Fn(&LoadError) + Send + Sync>;

/// Lifecycle callbacks of one request. Unset callbacks are skipped.
#[derive(Clone, Default)]
pub struct Callbacks {
    on_start: Option<Hook>,
    on_downloaded: Option<Hook>,
    on_progress: Option<ProgressHook>,
    on_loaded: Option<LoadedHook>,
    on_error: Option<ErrorHook>,
    on_end: Option<Hook>,
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_start", &self.on_start.is_some())
            .field("on_downloaded", &self.on_downloaded.is_some())
            .field("on_progress", &self.on_progress.is_some())
            .field("on_loaded", &self.on_loaded.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_end", &self.on_end.is_some())
            .finish()
    }
}

impl Callbacks {
    pub(crate) fn start(&self) {
        if let Some(hook) = &self.on_start {
            hook();
        }
    }

    pub(crate) fn downloaded(&self) {
        if let Some(hook) = &self.on_downloaded {
            hook();
        }
    }

    pub(crate) fn progress(&self, percent: u8) {
        if let Some(hook) = &self.on_progress {
            hook(percent);
        }
    }

    pub(crate) fn loaded(&self, image: &DecodedImage) {
        if let Some(hook) = &self.on_loaded {
            hook(image);
        }
    }

    pub(crate) fn error(&self, error: &LoadError) {
        if let Some(hook) = &self.on_error {
            hook(error);
        }
    }

    pub(crate) fn end(&self) {
        if let Some(hook) = &self.on_end {
            hook();
        }
    }
}

/// Per-request options.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Keep the entry on disk after the session finishes.
    pub cache_enabled: bool,
    /// Fade-in duration; `None` or zero swaps immediately.
    pub fade: Option<Duration>,
    /// Time budget of one fetch attempt.
    pub timeout: Duration,
    /// Total fetch attempts when the gateway answers 504.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles per attempt.
    pub retry_base_delay: Duration,
    /// Encoded image shown while loading.
    pub loading_placeholder: Option<Bytes>,
    /// Encoded image shown after a failure.
    pub error_placeholder: Option<Bytes>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            fade: None,
            timeout: DEFAULT_ATTEMPT_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            loading_placeholder: None,
            error_placeholder: None,
        }
    }
}

impl RequestOptions {
    /// Retry policy derived from these options.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.retry_base_delay)
    }

    /// Transition for delivering the final image or the error placeholder.
    #[must_use]
    pub fn transition(&self, target: &Target) -> Transition {
        match self.fade {
            Some(duration) if !duration.is_zero() => {
                Transition::Fade(FadeCurve::new(duration, target.alpha()))
            }
            _ => Transition::Swap,
        }
    }
}

/// One caller request: what to fetch, where to show it, and whom to tell.
///
/// Built once with [`ImageRequest::builder`] and never mutated afterwards.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use imgcache_core::present::{Target, TargetKind};
/// use imgcache_core::session::ImageRequest;
///
/// let request = ImageRequest::builder()
///     .url("https://example.com/avatar.png")
///     .target(Target::new("profile-avatar", TargetKind::Sprite))
///     .fade(Duration::from_millis(250))
///     .on_progress(|percent| println!("{percent}%"))
///     .build();
/// assert_eq!(request.url(), Some("https://example.com/avatar.png"));
/// ```
#[derive(Debug, Clone)]
pub struct ImageRequest {
    url: Option<String>,
    target: Option<Target>,
    options: RequestOptions,
    callbacks: Callbacks,
}

/// Request after validation: parsed URL, derived key, known target.
#[derive(Debug, Clone)]
pub(crate) struct ValidatedRequest {
    pub(crate) url: Url,
    pub(crate) key: CacheKey,
    pub(crate) target: Target,
}

impl ImageRequest {
    /// Starts building a request.
    #[must_use]
    pub fn builder() -> ImageRequestBuilder {
        ImageRequestBuilder::default()
    }

    /// The raw URL, if one was set.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// The target, if one was set.
    #[must_use]
    pub fn target(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    /// Request options.
    #[must_use]
    pub fn options(&self) -> &RequestOptions {
        &self.options
    }

    pub(crate) fn callbacks(&self) -> &Callbacks {
        &self.callbacks
    }

    /// Checks URL and target and derives the cache key.
    pub(crate) fn validate(&self) -> Result<ValidatedRequest, LoadError> {
        let raw = self
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| LoadError::invalid_configuration("no URL set"))?;
        let target = self
            .target
            .clone()
            .ok_or_else(|| LoadError::invalid_configuration("no target set"))?;

        let url = normalize_url(raw).map_err(|_| LoadError::invalid_url(raw))?;
        if !matches!(url.scheme(), "http" | "https") || !url.has_host() {
            return Err(LoadError::invalid_url(raw));
        }
        let key = CacheKey::from_normalized(&url);

        Ok(ValidatedRequest { url, key, target })
    }
}

/// Builder for [`ImageRequest`].
#[derive(Debug, Default)]
#[must_use]
pub struct ImageRequestBuilder {
    url: Option<String>,
    target: Option<Target>,
    options: RequestOptions,
    callbacks: Callbacks,
}

impl ImageRequestBuilder {
    /// Sets the URL to fetch.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the consumer that receives the image.
    pub fn target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }

    /// Replaces all options at once.
    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Keeps (`true`) or drops (`false`) the cache entry after the session.
    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.options.cache_enabled = enabled;
        self
    }

    /// Fades the image in over `duration`.
    pub fn fade(mut self, duration: Duration) -> Self {
        self.options.fade = Some(duration);
        self
    }

    /// Sets the per-attempt time budget.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    /// Sets the total attempts when the gateway answers 504.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.options.max_attempts = attempts;
        self
    }

    /// Sets the delay before the first retry.
    pub fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.options.retry_base_delay = delay;
        self
    }

    /// Encoded image pushed to the target as soon as the request validates.
    pub fn loading_placeholder(mut self, bytes: impl Into<Bytes>) -> Self {
        self.options.loading_placeholder = Some(bytes.into());
        self
    }

    /// Encoded image delivered instead when the request fails.
    pub fn error_placeholder(mut self, bytes: impl Into<Bytes>) -> Self {
        self.options.error_placeholder = Some(bytes.into());
        self
    }

    /// Called once the request validates.
    pub fn on_start(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.callbacks.on_start = Some(Arc::new(hook));
        self
    }

    /// Called once the bytes are available, from cache or network.
    pub fn on_downloaded(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.callbacks.on_downloaded = Some(Arc::new(hook));
        self
    }

    /// Called with whole download percentages.
    pub fn on_progress(mut self, hook: impl Fn(u8) + Send + Sync + 'static) -> Self {
        self.callbacks.on_progress = Some(Arc::new(hook));
        self
    }

    /// Called after the image was handed to the presenter.
    pub fn on_loaded(mut self, hook: impl Fn(&DecodedImage) + Send + Sync + 'static) -> Self {
        self.callbacks.on_loaded = Some(Arc::new(hook));
        self
    }

    /// Called once with the session's terminal error.
    pub fn on_error(mut self, hook: impl Fn(&LoadError) + Send + Sync + 'static) -> Self {
        self.callbacks.on_error = Some(Arc::new(hook));
        self
    }

    /// Called last, on every path.
    pub fn on_end(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.callbacks.on_end = Some(Arc::new(hook));
        self
    }

    /// Finishes the request.
    pub fn build(self) -> ImageRequest {
        ImageRequest {
            url: self.url,
            target: self.target,
            options: self.options,
            callbacks: self.callbacks,
        }
    }
}
