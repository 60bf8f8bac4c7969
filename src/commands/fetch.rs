//! `imgcache fetch`: run one session per URL through a shared loader.

use std::time::Duration;

use anyhow::{Context, Result};
use imgcache_core::download::constants::{DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_MAX_ATTEMPTS};
use imgcache_core::present::{Target, TargetKind};
use imgcache_core::session::{ImageRequest, SessionReport};
use imgcache_core::ImageLoader;
use indicatif::ProgressBar;
use tracing::{debug, info};

use crate::app_config::FileConfig;
use crate::cli::FetchArgs;
use crate::output::ProgressBoard;

/// Request options after merging CLI flags over file config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FetchSettings {
    pub(crate) cache_enabled: bool,
    pub(crate) timeout: Duration,
    pub(crate) max_attempts: u32,
    pub(crate) fade: Option<Duration>,
}

impl FetchSettings {
    /// CLI flags win over file values, which win over library defaults.
    pub(crate) fn resolve(args: &FetchArgs, file: Option<&FileConfig>) -> Self {
        let cache_enabled = if args.no_cache {
            false
        } else {
            file.and_then(|f| f.cache_enabled).unwrap_or(true)
        };
        let timeout = args
            .timeout_secs
            .or_else(|| file.and_then(|f| f.timeout_secs))
            .map_or(DEFAULT_ATTEMPT_TIMEOUT, Duration::from_secs);
        let max_attempts = args
            .max_attempts
            .or_else(|| file.and_then(|f| f.max_attempts))
            .unwrap_or(DEFAULT_MAX_ATTEMPTS);
        let fade = args
            .fade_ms
            .or_else(|| file.and_then(|f| f.fade_ms))
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);

        Self {
            cache_enabled,
            timeout,
            max_attempts,
            fade,
        }
    }

    fn request(&self, url: &str, index: usize, bar: &ProgressBar) -> ImageRequest {
        let progress_bar = bar.clone();
        let loaded_bar = bar.clone();
        let label = url.to_string();

        let mut builder = ImageRequest::builder()
            .url(url)
            .target(Target::new(format!("image-{index}"), TargetKind::Texture))
            .cache_enabled(self.cache_enabled)
            .timeout(self.timeout)
            .max_attempts(self.max_attempts)
            .on_progress(move |percent| progress_bar.set_position(u64::from(percent)))
            .on_loaded(move |image| {
                loaded_bar.set_message(format!("{label} {}x{}", image.width(), image.height()));
            });
        if let Some(fade) = self.fade {
            builder = builder.fade(fade);
        }
        builder.build()
    }
}

/// Fetches every URL concurrently. Returns `false` if any session failed.
pub(crate) async fn run_fetch_command(
    loader: &ImageLoader,
    args: &FetchArgs,
    file: Option<&FileConfig>,
    quiet: bool,
) -> Result<bool> {
    let settings = FetchSettings::resolve(args, file);
    debug!(?settings, urls = args.urls.len(), "starting fetch");

    let board = ProgressBoard::new(!quiet && !args.json);
    let tasks: Vec<_> = args
        .urls
        .iter()
        .enumerate()
        .map(|(index, url)| {
            let bar = board.bar(url);
            let task = loader.load(settings.request(url, index, &bar));
            (bar, task)
        })
        .collect();

    let mut all_ok = true;
    let mut from_cache = 0usize;
    for (bar, task) in tasks {
        let report = task.wait().await;
        all_ok &= report.is_success();
        from_cache += usize::from(report.from_cache);

        if report.is_success() {
            bar.finish();
        } else {
            bar.abandon();
        }
        print_report(&report, args.json, quiet)?;
    }

    info!(
        total = args.urls.len(),
        from_cache,
        failed = !all_ok,
        "fetch complete"
    );
    Ok(all_ok)
}

fn print_report(report: &SessionReport, json: bool, quiet: bool) -> Result<()> {
    if json {
        let line = serde_json::to_string(report).context("Failed to serialize session report")?;
        println!("{line}");
        return Ok(());
    }

    let url = report.url.as_deref().unwrap_or_default();
    if let Some(message) = &report.error_message {
        eprintln!("failed  {url}: {message}");
    } else if !quiet {
        let source = if report.from_cache { "cache" } else { "network" };
        println!(
            "ok      {url} {}x{} {} bytes ({source})",
            report.width.unwrap_or_default(),
            report.height.unwrap_or_default(),
            report.bytes
        );
    }
    Ok(())
}
