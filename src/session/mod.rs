//! Per-request lifecycle.
//!
//! An [`ImageRequest`] describes one load: URL, target, options and
//! callbacks. A [`RequestSession`] runs it through the state machine
//! described by [`SessionState`] and yields a [`SessionReport`].

mod report;
mod request;
mod runner;

pub use report::{SessionReport, SessionState};
pub use request::{Callbacks, ImageRequest, ImageRequestBuilder, RequestOptions};
pub use runner::{RequestSession, SessionTask};

pub use crate::error::{LoadError, LoadErrorKind};
