//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Fetch, cache and inspect remote images.
///
/// Concurrent fetches of the same URL share one download; finished
/// downloads are kept in a disk cache keyed by URL.
#[derive(Parser, Debug)]
#[command(name = "imgcache")]
#[command(author, version, about)]
#[command(arg_required_else_help = true)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Cache directory (overrides config file and platform default)
    #[arg(long, value_name = "DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch one or more images through the cache
    Fetch(FetchArgs),

    /// Print the cache key and entry path for a URL
    Key {
        /// Image URL
        url: String,
    },

    /// Remove the cache entry for a URL
    Clear {
        /// Image URL
        url: String,
    },

    /// Remove every cached file
    ClearAll,
}

/// Arguments of `imgcache fetch`.
#[derive(clap::Args, Debug)]
pub struct FetchArgs {
    /// Image URLs to fetch
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// Delete each entry after use instead of keeping it cached
    #[arg(long)]
    pub no_cache: bool,

    /// Per-attempt timeout in seconds (1-3600)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub timeout_secs: Option<u64>,

    /// Total attempts when the server answers 504 (1-10)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=10))]
    pub max_attempts: Option<u32>,

    /// Fade-in duration in milliseconds (0-10000)
    #[arg(long, value_parser = clap::value_parser!(u64).range(0..=10000))]
    pub fade_ms: Option<u64>,

    /// Print one JSON report per URL instead of progress bars
    #[arg(long)]
    pub json: bool,
}
