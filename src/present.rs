//! Presentation boundary: where decoded images go.
//!
//! The engine does not render anything. Once an image is decoded it calls
//! [`Presenter::present`] with the request's [`Target`] and a
//! [`Transition`]. Fades are described by a [`FadeCurve`], a pure function
//! of elapsed time that the presenter samples from its own tick source.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::codec::DecodedImage;

/// Kind of surface receiving the image; presenters dispatch on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// A UI sprite widget.
    Sprite,
    /// A raw texture widget.
    Texture,
    /// A material on a rendered mesh.
    Material,
}

/// The consumer that receives a request's image.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    handle: String,
    kind: TargetKind,
    alpha: f32,
}

impl Target {
    /// Creates a target with opaque resting alpha.
    pub fn new(handle: impl Into<String>, kind: TargetKind) -> Self {
        Self {
            handle: handle.into(),
            kind,
            alpha: 1.0,
        }
    }

    /// Sets the target's resting alpha, which a fade ends at.
    #[must_use]
    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha.clamp(0.0, 1.0);
        self
    }

    /// Opaque handle the host uses to find its surface.
    #[must_use]
    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// Surface kind.
    #[must_use]
    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    /// Resting alpha.
    #[must_use]
    pub fn alpha(&self) -> f32 {
        self.alpha
    }
}

/// Alpha ramp from 0 to the target's resting alpha over `duration`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeCurve {
    duration: Duration,
    target_alpha: f32,
}

impl FadeCurve {
    /// Creates a curve ending at `target_alpha` after `duration`.
    #[must_use]
    pub fn new(duration: Duration, target_alpha: f32) -> Self {
        Self {
            duration,
            target_alpha: target_alpha.clamp(0.0, 1.0),
        }
    }

    /// Total fade duration.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Alpha the fade ends at.
    #[must_use]
    pub fn target_alpha(&self) -> f32 {
        self.target_alpha
    }

    /// Alpha at `elapsed`; non-decreasing in `elapsed`.
    #[must_use]
    pub fn alpha_at(&self, elapsed: Duration) -> f32 {
        if self.duration.is_zero() || elapsed >= self.duration {
            return self.target_alpha;
        }
        self.target_alpha * (elapsed.as_secs_f32() / self.duration.as_secs_f32())
    }

    /// True once `elapsed` reaches the end of the fade.
    #[must_use]
    pub fn is_complete(&self, elapsed: Duration) -> bool {
        elapsed >= self.duration
    }

    /// Samples the curve every `tick` until complete or cancelled.
    ///
    /// `apply` always receives the final alpha unless `cancel` fires first.
    pub async fn drive(
        &self,
        tick: Duration,
        cancel: &CancellationToken,
        mut apply: impl FnMut(f32) + Send,
    ) {
        let started = tokio::time::Instant::now();
        let mut interval = tokio::time::interval(tick.max(Duration::from_millis(1)));
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                _ = interval.tick() => {}
            }
            let elapsed = started.elapsed();
            apply(self.alpha_at(elapsed));
            if self.is_complete(elapsed) {
                return;
            }
        }
    }
}

/// How the image replaces whatever the target shows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    /// Replace immediately.
    Swap,
    /// Replace and fade in along the curve.
    Fade(FadeCurve),
}

/// Receives decoded images for display.
#[async_trait]
pub trait Presenter: Send + Sync {
    /// Shows `image` on `target` using `transition`.
    async fn present(&self, target: &Target, image: Arc<DecodedImage>, transition: Transition);
}

/// One presentation request forwarded by [`ChannelPresenter`].
#[derive(Debug, Clone)]
pub struct Presentation {
    /// Where to show the image.
    pub target: Target,
    /// The decoded image.
    pub image: Arc<DecodedImage>,
    /// How to show it.
    pub transition: Transition,
}

/// Presenter that forwards every presentation to a channel, for hosts
/// that apply them on their own frame loop.
#[derive(Debug, Clone)]
pub struct ChannelPresenter {
    tx: mpsc::UnboundedSender<Presentation>,
}

impl ChannelPresenter {
    /// Creates the presenter and the receiving end for the host loop.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Presentation>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Presenter for ChannelPresenter {
    async fn present(&self, target: &Target, image: Arc<DecodedImage>, transition: Transition) {
        let presentation = Presentation {
            target: target.clone(),
            image,
            transition,
        };
        if self.tx.send(presentation).is_err() {
            debug!(target = %target.handle(), "presentation receiver dropped");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use image::RgbaImage;

    use super::*;

    #[test]
    fn test_alpha_ramps_linearly_to_target() {
        let curve = FadeCurve::new(Duration::from_millis(400), 0.8);
        assert!(curve.alpha_at(Duration::ZERO).abs() < f32::EPSILON);
        assert!((curve.alpha_at(Duration::from_millis(200)) - 0.4).abs() < 1e-5);
        assert!((curve.alpha_at(Duration::from_millis(400)) - 0.8).abs() < f32::EPSILON);
        assert!((curve.alpha_at(Duration::from_secs(5)) - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn test_alpha_is_non_decreasing() {
        let curve = FadeCurve::new(Duration::from_millis(100), 1.0);
        let samples: Vec<f32> = (0..=120)
            .map(|ms| curve.alpha_at(Duration::from_millis(ms)))
            .collect();
        assert!(samples.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_zero_duration_is_immediately_complete() {
        let curve = FadeCurve::new(Duration::ZERO, 1.0);
        assert!(curve.is_complete(Duration::ZERO));
        assert!((curve.alpha_at(Duration::ZERO) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_target_alpha_is_clamped() {
        let target = Target::new("t", TargetKind::Sprite).with_alpha(3.0);
        assert!((target.alpha() - 1.0).abs() < f32::EPSILON);
        let curve = FadeCurve::new(Duration::ZERO, -1.0);
        assert!(curve.target_alpha().abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_drive_ends_at_target_alpha() {
        let curve = FadeCurve::new(Duration::from_millis(30), 0.5);
        let samples = Mutex::new(Vec::new());
        curve
            .drive(Duration::from_millis(5), &CancellationToken::new(), |alpha| {
                samples.lock().unwrap().push(alpha);
            })
            .await;

        let samples = samples.into_inner().unwrap();
        assert!(samples.windows(2).all(|w| w[0] <= w[1]));
        assert!((samples.last().copied().unwrap() - 0.5).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_drive_stops_when_cancelled() {
        let curve = FadeCurve::new(Duration::from_secs(60), 1.0);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut calls = 0;
        curve
            .drive(Duration::from_millis(1), &cancel, |_| calls += 1)
            .await;
        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn test_channel_presenter_forwards_presentation() {
        let (presenter, mut rx) = ChannelPresenter::new();
        let target = Target::new("avatar", TargetKind::Texture);
        let image = Arc::new(DecodedImage::from_rgba(RgbaImage::new(1, 1)));

        presenter
            .present(&target, Arc::clone(&image), Transition::Swap)
            .await;

        let received = rx.recv().await.unwrap();
        assert_eq!(received.target, target);
        assert_eq!(received.transition, Transition::Swap);
        assert_eq!(received.image.width(), 1);
    }
}
