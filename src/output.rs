//! Terminal output: per-URL progress bars and a log-backed presenter.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use imgcache_core::codec::DecodedImage;
use imgcache_core::present::{Presenter, Target, Transition};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Frame interval used to sample fades.
const FADE_TICK: Duration = Duration::from_millis(16);

/// One progress bar per fetched URL, stacked in the terminal.
pub(crate) struct ProgressBoard {
    multi: Option<MultiProgress>,
}

impl ProgressBoard {
    /// Creates the board; a disabled board hands out hidden bars.
    pub(crate) fn new(enabled: bool) -> Self {
        Self {
            multi: enabled.then(MultiProgress::new),
        }
    }

    /// Adds a 0..=100 bar labelled with `label`.
    pub(crate) fn bar(&self, label: &str) -> ProgressBar {
        let Some(multi) = &self.multi else {
            return ProgressBar::hidden();
        };
        let bar = multi.add(ProgressBar::new(100));
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{bar:30}] {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.set_message(label.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    }
}

/// Presenter for a headless terminal: logs each presentation and plays
/// fades against the clock.
#[derive(Debug, Default)]
pub(crate) struct LogPresenter;

#[async_trait]
impl Presenter for LogPresenter {
    async fn present(&self, target: &Target, image: Arc<DecodedImage>, transition: Transition) {
        match transition {
            Transition::Swap => {}
            Transition::Fade(curve) => {
                curve
                    .drive(FADE_TICK, &CancellationToken::new(), |alpha| {
                        trace!(target = %target.handle(), alpha, "fade step");
                    })
                    .await;
            }
        }
        debug!(
            target = %target.handle(),
            kind = ?target.kind(),
            width = image.width(),
            height = image.height(),
            fade = matches!(transition, Transition::Fade(_)),
            "image presented"
        );
    }
}
