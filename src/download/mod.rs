//! Network retrieval of image payloads.
//!
//! [`HttpClient`] performs a single streamed GET; [`Downloader`] wraps it in
//! a bounded retry loop that only retries gateway timeouts (HTTP 504). An
//! attempt running past its own time budget fails immediately.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use imgcache_core::download::{Downloader, HttpClient, RetryPolicy};
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let downloader = Downloader::new(HttpClient::new());
//! let url = Url::parse("https://example.com/cat.png")?;
//! let payload = downloader
//!     .fetch(
//!         &url,
//!         Duration::from_secs(30),
//!         &RetryPolicy::default(),
//!         &|percent| println!("{percent}%"),
//!         &CancellationToken::new(),
//!     )
//!     .await?;
//! println!("{} bytes in {} attempt(s)", payload.bytes.len(), payload.attempts);
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod downloader;
mod error;
mod retry;

pub use client::HttpClient;
pub use downloader::{Downloader, FetchedPayload};
pub use error::DownloadError;
pub use retry::{FailureType, RetryDecision, RetryPolicy, classify_error};
