//! Image loading core library.
//!
//! Fetches remote images over HTTP, keeps them in a disk cache keyed by
//! URL, collapses concurrent requests for the same URL into one network
//! fetch, and delivers decoded images to a host-provided presenter.
//!
//! # Architecture
//!
//! - [`cache`] - URL keys and the atomic on-disk store
//! - [`coordinator`] - single-flight registry of in-progress fetches
//! - [`download`] - HTTP fetch with bounded retry and progress
//! - [`codec`] - decoding boundary backed by the `image` crate
//! - [`present`] - presentation boundary, targets and fades
//! - [`session`] - per-request state machine and callbacks
//! - [`loader`] - shared collaborators and the cache operations

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod codec;
pub mod coordinator;
pub mod download;
pub mod error;
pub mod loader;
pub mod present;
pub mod session;

// Re-export commonly used types
pub use cache::{CacheKey, CacheStore};
pub use codec::{DecodedImage, ImageCodec, StandardCodec};
pub use coordinator::FetchCoordinator;
pub use error::{LoadError, LoadErrorKind};
pub use loader::{ImageLoader, LoaderConfig};
pub use present::{ChannelPresenter, Presenter, Target, TargetKind, Transition};
pub use session::{ImageRequest, RequestSession, SessionReport, SessionState, SessionTask};
