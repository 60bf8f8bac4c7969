//! Shared helpers for integration tests: a recording presenter, an ordered
//! callback log, PNG fixtures and a loader on a temporary cache root.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{ImageBuffer, ImageFormat, Rgba, RgbaImage};
use imgcache_core::codec::DecodedImage;
use imgcache_core::present::{Presenter, Target, Transition};
use imgcache_core::session::ImageRequestBuilder;
use imgcache_core::{ImageLoader, LoaderConfig};
use tempfile::TempDir;

/// Release delay used by test loaders.
pub const TEST_RELEASE_DELAY: Duration = Duration::from_millis(50);

/// Encodes a solid `width` x `height` PNG.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img: RgbaImage = ImageBuffer::from_pixel(width, height, Rgba([200, 40, 40, 255]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)
        .expect("encode PNG fixture");
    out.into_inner()
}

/// One call to [`RecordingPresenter::present`].
#[derive(Debug, Clone)]
pub struct Presented {
    pub target: String,
    pub width: u32,
    pub height: u32,
    pub transition: Transition,
}

/// Presenter that remembers every presentation.
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    presented: Mutex<Vec<Presented>>,
}

impl RecordingPresenter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn presented(&self) -> Vec<Presented> {
        self.presented.lock().expect("presenter lock").clone()
    }
}

#[async_trait]
impl Presenter for RecordingPresenter {
    async fn present(&self, target: &Target, image: Arc<DecodedImage>, transition: Transition) {
        self.presented
            .lock()
            .expect("presenter lock")
            .push(Presented {
                target: target.handle().to_string(),
                width: image.width(),
                height: image.height(),
                transition,
            });
    }
}

/// Ordered record of lifecycle callbacks.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hooks every callback of `builder` into this log.
    pub fn attach(&self, builder: ImageRequestBuilder) -> ImageRequestBuilder {
        let start = self.clone();
        let downloaded = self.clone();
        let progress = self.clone();
        let loaded = self.clone();
        let error = self.clone();
        let end = self.clone();
        builder
            .on_start(move || start.push("start".to_string()))
            .on_downloaded(move || downloaded.push("downloaded".to_string()))
            .on_progress(move |p| progress.push(format!("progress:{p}")))
            .on_loaded(move |img| loaded.push(format!("loaded:{}x{}", img.width(), img.height())))
            .on_error(move |e| error.push(format!("error:{:?}", e.kind())))
            .on_end(move || end.push("end".to_string()))
    }

    fn push(&self, event: String) {
        self.events.lock().expect("event log lock").push(event);
    }

    /// All events in order.
    pub fn events(&self) -> Vec<String> {
        self.events.lock().expect("event log lock").clone()
    }

    /// Events without the progress entries.
    pub fn milestones(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| !e.starts_with("progress:"))
            .collect()
    }

    /// Reported progress percentages in order.
    pub fn progress(&self) -> Vec<u8> {
        self.events()
            .iter()
            .filter_map(|e| e.strip_prefix("progress:"))
            .map(|p| p.parse().expect("progress value"))
            .collect()
    }
}

/// Loader on a fresh temp cache root with a short release delay.
pub fn test_loader(presenter: Arc<RecordingPresenter>) -> (TempDir, ImageLoader) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let mut config = LoaderConfig::with_cache_root(dir.path().join("cache"));
    config.release_delay = TEST_RELEASE_DELAY;
    (dir, ImageLoader::new(config, presenter))
}
