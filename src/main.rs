//! CLI entry point for imgcache.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use imgcache_core::loader::default_cache_root;
use imgcache_core::{ImageLoader, LoaderConfig};
use tracing::debug;

mod app_config;
mod cli;
mod commands;
mod output;

use app_config::{VerbositySetting, load_default_file_config};
use cli::{Args, Command};
use commands::{run_clear_all_command, run_clear_command, run_fetch_command, run_key_command};
use output::LogPresenter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    let loaded = load_default_file_config()?;
    let file_config = loaded.config.as_ref();

    // Priority: RUST_LOG env var > CLI flags > config file > default (info)
    let file_verbosity = file_config
        .and_then(|c| c.verbosity)
        .unwrap_or(VerbositySetting::Default);
    let quiet = args.quiet || (args.verbose == 0 && file_verbosity == VerbositySetting::Quiet);
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => file_verbosity.log_level(),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, config_path = ?loaded.path, "CLI arguments parsed");

    let cache_root = args
        .cache_dir
        .clone()
        .or_else(|| file_config.and_then(|c| c.cache_dir.clone()))
        .unwrap_or_else(default_cache_root);
    let loader = ImageLoader::new(
        LoaderConfig::with_cache_root(cache_root),
        Arc::new(LogPresenter),
    );

    match &args.command {
        Command::Fetch(fetch) => {
            if !run_fetch_command(&loader, fetch, file_config, quiet).await? {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Key { url } => run_key_command(&loader, url)?,
        Command::Clear { url } => run_clear_command(&loader, url).await,
        Command::ClearAll => run_clear_all_command(&loader).await,
    }

    Ok(ExitCode::SUCCESS)
}
