//! The request session state machine.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, instrument, warn};

use super::report::{SessionReport, SessionState};
use super::request::{Callbacks, ImageRequest, ValidatedRequest};
use crate::cache::CacheKey;
use crate::codec::DecodedImage;
use crate::coordinator::{Acquire, FlightGuard, FlightOutcome};
use crate::download::DownloadError;
use crate::error::LoadError;
use crate::loader::ImageLoader;
use crate::present::{Target, Transition};

/// Handle to one spawned session run.
#[derive(Debug)]
pub struct SessionTask {
    handle: JoinHandle<SessionReport>,
}

impl SessionTask {
    /// Waits for the run to end and returns its report.
    pub async fn wait(self) -> SessionReport {
        match self.handle.await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "session task did not complete");
                let mut report = SessionReport::new(None, SessionState::Cancelled);
                report.fail(&LoadError::invalid_configuration(format!(
                    "session task did not complete: {e}"
                )));
                report
            }
        }
    }

    /// True once the run has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// State shared between a session, its runs and its release timer.
#[derive(Debug)]
struct SessionShared {
    request: Mutex<Option<Arc<ImageRequest>>>,
    state: Mutex<SessionState>,
    release_timer: Mutex<Option<CancellationToken>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionShared {
    fn state(&self) -> SessionState {
        *lock(&self.state)
    }

    fn set_state(&self, state: SessionState) {
        let mut current = lock(&self.state);
        let from = *current;
        if from != state {
            debug!(%from, to = %state, "session state");
            *current = state;
        }
    }

    fn request(&self) -> Option<Arc<ImageRequest>> {
        lock(&self.request).clone()
    }

    fn cancel_release_timer(&self) {
        if let Some(timer) = lock(&self.release_timer).take() {
            timer.cancel();
        }
    }

    fn arm_release_timer(&self, timer: CancellationToken) {
        if let Some(previous) = lock(&self.release_timer).replace(timer) {
            previous.cancel();
        }
    }

    fn release(&self) {
        lock(&self.release_timer).take();
        lock(&self.request).take();
        self.set_state(SessionState::Released);
    }
}

/// Drives one [`ImageRequest`] from validation to release.
///
/// Each [`run`](Self::run) spawns a task that validates the request,
/// obtains the payload from the cache or through the shared
/// [`FetchCoordinator`](crate::coordinator::FetchCoordinator), decodes it
/// and hands it to the loader's presenter. Callbacks fire in order
/// `on_start`, `on_progress`*, `on_downloaded`, `on_loaded`, then
/// `on_end`; on failure `on_error` fires once before `on_end`.
///
/// After finishing, the session releases its request once the loader's
/// release delay elapses. Calling `run` again before that cancels the
/// pending release; after it, `run` reports an invalid configuration.
#[derive(Debug)]
pub struct RequestSession {
    loader: ImageLoader,
    shared: Arc<SessionShared>,
    active: Option<CancellationToken>,
}

impl RequestSession {
    /// Creates an idle session for `request` on `loader`.
    #[must_use]
    pub fn new(loader: ImageLoader, request: ImageRequest) -> Self {
        Self {
            loader,
            shared: Arc::new(SessionShared {
                request: Mutex::new(Some(Arc::new(request))),
                state: Mutex::new(SessionState::Unconfigured),
                release_timer: Mutex::new(None),
            }),
            active: None,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// True once the request has been released.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.shared.request().is_none()
    }

    /// Starts a run, superseding any run still in progress.
    ///
    /// The superseded run stops at its next suspension point and fires no
    /// further callbacks.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn run(&mut self) -> SessionTask {
        self.cancel();
        self.shared.cancel_release_timer();

        let Some(request) = self.shared.request() else {
            debug!("run on released session");
            let mut report = SessionReport::new(None, SessionState::Released);
            report.fail(&LoadError::invalid_configuration(
                "session has been released",
            ));
            return SessionTask {
                handle: tokio::spawn(async move { report }),
            };
        };

        let cancel = CancellationToken::new();
        self.active = Some(cancel.clone());
        let run = SessionRun {
            loader: self.loader.clone(),
            shared: Arc::clone(&self.shared),
            request,
            cancel,
        };
        let span = info_span!("session", url = run.request.url().unwrap_or_default());
        SessionTask {
            handle: tokio::spawn(run.execute().instrument(span)),
        }
    }

    /// Cancels the run in progress, if any.
    pub fn cancel(&mut self) {
        if let Some(token) = self.active.take() {
            token.cancel();
            if !matches!(
                self.shared.state(),
                SessionState::Finished | SessionState::Released
            ) {
                self.shared.set_state(SessionState::Cancelled);
            }
        }
    }
}

/// Payload obtained for delivery.
struct Acquired {
    bytes: Bytes,
    from_cache: bool,
}

/// One run of a session; owns everything the spawned task touches.
struct SessionRun {
    loader: ImageLoader,
    shared: Arc<SessionShared>,
    request: Arc<ImageRequest>,
    cancel: CancellationToken,
}

impl SessionRun {
    async fn execute(self) -> SessionReport {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                debug!("session run cancelled");
                SessionReport::new(self.request.url(), SessionState::Cancelled)
            }
            report = self.drive() => report,
        }
    }

    /// Moves the shared state unless this run was superseded.
    fn enter(&self, state: SessionState) {
        if !self.cancel.is_cancelled() {
            self.shared.set_state(state);
        }
    }

    /// Fires a callback unless this run was superseded.
    fn fire(&self, hook: impl FnOnce(&Callbacks)) {
        if !self.cancel.is_cancelled() {
            hook(self.request.callbacks());
        }
    }

    async fn drive(&self) -> SessionReport {
        let mut report = SessionReport::new(self.request.url(), SessionState::Unconfigured);
        self.enter(SessionState::Unconfigured);

        let validated = match self.request.validate() {
            Ok(validated) => validated,
            Err(error) => {
                warn!(error = %error, "request rejected");
                self.enter(SessionState::Errored);
                self.fire(|cb| cb.error(&error));
                report.fail(&error);
                self.finish(None, &mut report).await;
                return report;
            }
        };
        report.key = Some(validated.key.to_string());
        self.enter(SessionState::Validated);

        if let Some(placeholder) = &self.request.options().loading_placeholder {
            self.show_placeholder(placeholder, &validated.target, Transition::Swap, "loading")
                .await;
        }
        self.fire(Callbacks::start);

        if let Err(error) = self.deliver(&validated, &mut report).await {
            warn!(error = %error, "image load failed");
            self.enter(SessionState::Errored);
            self.fire(|cb| cb.error(&error));
            report.fail(&error);

            let options = self.request.options();
            if let Some(placeholder) = &options.error_placeholder {
                self.enter(SessionState::Delivering);
                let transition = options.transition(&validated.target);
                if let Some(image) = self
                    .show_placeholder(placeholder, &validated.target, transition, "error")
                    .await
                {
                    self.fire(|cb| cb.loaded(&image));
                }
            }
        }

        self.finish(Some(&validated.key), &mut report).await;
        report
    }

    async fn deliver(
        &self,
        validated: &ValidatedRequest,
        report: &mut SessionReport,
    ) -> Result<(), LoadError> {
        self.loader.cache().ensure_root().await?;

        let acquired = self.acquire(validated).await?;
        report.from_cache = acquired.from_cache;
        report.bytes = acquired.bytes.len();
        self.fire(|cb| cb.progress(100));

        self.enter(SessionState::Delivering);
        let image = self.decode(acquired.bytes).await?;
        report.width = Some(image.width());
        report.height = Some(image.height());

        let transition = self.request.options().transition(&validated.target);
        self.loader
            .presenter()
            .present(&validated.target, Arc::clone(&image), transition)
            .await;
        self.fire(|cb| cb.loaded(&image));
        Ok(())
    }

    /// Reads the cache or joins/starts the single flight for the key.
    async fn acquire(&self, validated: &ValidatedRequest) -> Result<Acquired, LoadError> {
        loop {
            if let Some(bytes) = self.read_cached(&validated.key).await? {
                return Ok(self.cache_hit(bytes));
            }

            match self.loader.coordinator().try_acquire(&validated.key) {
                Acquire::Owner(guard) => return self.fetch_as_owner(validated, guard).await,
                Acquire::InFlight(flight) => {
                    self.enter(SessionState::AwaitingFetch);
                    debug!(key = %validated.key, "joining in-flight fetch");
                    match flight.wait().await {
                        FlightOutcome::Fetched(bytes) => {
                            self.fire(Callbacks::downloaded);
                            return Ok(Acquired {
                                bytes,
                                from_cache: false,
                            });
                        }
                        FlightOutcome::Failed(error) => return Err(error),
                        FlightOutcome::Abandoned => {
                            debug!(key = %validated.key, "fetch owner went away, retrying");
                        }
                    }
                }
            }
        }
    }

    fn cache_hit(&self, bytes: Bytes) -> Acquired {
        self.enter(SessionState::CacheHit);
        self.fire(Callbacks::downloaded);
        Acquired {
            bytes,
            from_cache: true,
        }
    }

    /// Reads a cache entry; a vanished entry counts as a miss.
    async fn read_cached(&self, key: &CacheKey) -> Result<Option<Bytes>, LoadError> {
        let cache = self.loader.cache();
        if !cache.exists(key).await {
            return Ok(None);
        }
        match cache.read(key).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.is_not_found() => {
                debug!(key = %key, "cache entry vanished before read");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self, validated, guard), fields(key = %validated.key))]
    async fn fetch_as_owner(
        &self,
        validated: &ValidatedRequest,
        guard: FlightGuard,
    ) -> Result<Acquired, LoadError> {
        // A previous owner may have written the entry after our first check.
        match self.read_cached(&validated.key).await {
            Ok(Some(bytes)) => {
                guard.release(FlightOutcome::Fetched(bytes.clone()));
                return Ok(self.cache_hit(bytes));
            }
            Ok(None) => {}
            Err(error) => {
                guard.release(FlightOutcome::Failed(error.clone()));
                return Err(error);
            }
        }

        self.enter(SessionState::Fetching);
        let options = self.request.options();
        let on_progress = |percent: u8| self.fire(|cb| cb.progress(percent));
        let fetched = self
            .loader
            .downloader()
            .fetch(
                &validated.url,
                options.timeout,
                &options.retry_policy(),
                &on_progress,
                &self.cancel,
            )
            .await;

        let payload = match fetched {
            Ok(payload) => payload,
            Err(e @ DownloadError::Cancelled { .. }) => {
                drop(guard);
                return Err(e.into());
            }
            Err(e) => {
                let error = LoadError::from(e);
                guard.release(FlightOutcome::Failed(error.clone()));
                return Err(error);
            }
        };

        if let Err(e) = self
            .loader
            .cache()
            .write(&validated.key, payload.bytes.clone())
            .await
        {
            let error = LoadError::from(e);
            guard.release(FlightOutcome::Failed(error.clone()));
            return Err(error);
        }

        self.fire(Callbacks::downloaded);
        guard.release(FlightOutcome::Fetched(payload.bytes.clone()));
        Ok(Acquired {
            bytes: payload.bytes,
            from_cache: false,
        })
    }

    async fn decode(&self, bytes: Bytes) -> Result<Arc<DecodedImage>, LoadError> {
        let codec = Arc::clone(self.loader.codec());
        let decoded = tokio::task::spawn_blocking(move || codec.decode(&bytes))
            .await
            .map_err(|e| LoadError::Decode {
                message: format!("decoder task failed: {e}"),
            })??;
        Ok(Arc::new(decoded))
    }

    /// Decodes and presents a placeholder; failures are logged only.
    async fn show_placeholder(
        &self,
        bytes: &Bytes,
        target: &Target,
        transition: Transition,
        which: &'static str,
    ) -> Option<Arc<DecodedImage>> {
        match self.decode(bytes.clone()).await {
            Ok(image) => {
                self.loader
                    .presenter()
                    .present(target, Arc::clone(&image), transition)
                    .await;
                Some(image)
            }
            Err(error) => {
                warn!(placeholder = which, error = %error, "placeholder not shown");
                None
            }
        }
    }

    async fn finish(&self, key: Option<&CacheKey>, report: &mut SessionReport) {
        self.enter(SessionState::Finished);
        report.state = SessionState::Finished;

        if let Some(key) = key {
            if !self.request.options().cache_enabled {
                self.loader.cache().delete_one(key).await;
            }
        }

        self.fire(Callbacks::end);
        self.schedule_release();
    }

    fn schedule_release(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        let timer = CancellationToken::new();
        self.shared.arm_release_timer(timer.clone());

        let shared = Arc::clone(&self.shared);
        let delay = self.loader.config().release_delay;
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = timer.cancelled() => debug!("release cancelled"),
                () = tokio::time::sleep(delay) => {
                    shared.release();
                    debug!("session released");
                }
            }
        });
    }
}
