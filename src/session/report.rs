//! Session states and the per-run report.

use std::fmt;

use serde::Serialize;

use crate::error::{LoadError, LoadErrorKind};

/// Lifecycle state of a [`RequestSession`](super::RequestSession).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Created or restarted; not yet validated.
    Unconfigured,
    /// URL and target accepted.
    Validated,
    /// Payload read from the cache.
    CacheHit,
    /// Waiting for another session's fetch of the same key.
    AwaitingFetch,
    /// This session owns the fetch.
    Fetching,
    /// Decoding and presenting.
    Delivering,
    /// A terminal error was reported.
    Errored,
    /// Terminal callbacks have fired.
    Finished,
    /// Request and callbacks dropped; the session cannot run again.
    Released,
    /// The run was superseded or cancelled.
    Cancelled,
}

impl SessionState {
    /// Snake-case name, as serialized.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unconfigured => "unconfigured",
            Self::Validated => "validated",
            Self::CacheHit => "cache_hit",
            Self::AwaitingFetch => "awaiting_fetch",
            Self::Fetching => "fetching",
            Self::Delivering => "delivering",
            Self::Errored => "errored",
            Self::Finished => "finished",
            Self::Released => "released",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one session run.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    /// The requested URL as given.
    pub url: Option<String>,
    /// Cache key, once the request validated.
    pub key: Option<String>,
    /// State the run ended in.
    pub state: SessionState,
    /// Whether the payload came from the cache.
    pub from_cache: bool,
    /// Payload size in bytes.
    pub bytes: usize,
    /// Decoded width.
    pub width: Option<u32>,
    /// Decoded height.
    pub height: Option<u32>,
    /// Kind of the terminal error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<LoadErrorKind>,
    /// Message of the terminal error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// The terminal error itself.
    #[serde(skip)]
    pub error: Option<LoadError>,
}

impl SessionReport {
    pub(crate) fn new(url: Option<&str>, state: SessionState) -> Self {
        Self {
            url: url.map(str::to_string),
            key: None,
            state,
            from_cache: false,
            bytes: 0,
            width: None,
            height: None,
            error_kind: None,
            error_message: None,
            error: None,
        }
    }

    pub(crate) fn fail(&mut self, error: &LoadError) {
        self.error_kind = Some(error.kind());
        self.error_message = Some(error.to_string());
        self.error = Some(error.clone());
    }

    /// True when the run finished without a terminal error.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.state == SessionState::Finished && self.error.is_none()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_state_serializes_snake_case() {
        let json = serde_json::to_string(&SessionState::AwaitingFetch).unwrap();
        assert_eq!(json, "\"awaiting_fetch\"");
        assert_eq!(SessionState::CacheHit.to_string(), "cache_hit");
    }

    #[test]
    fn test_failed_report_serializes_error_kind() {
        let mut report = SessionReport::new(Some("nope"), SessionState::Finished);
        report.fail(&LoadError::invalid_url("nope"));

        assert!(!report.is_success());
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["error_kind"], "invalid_url");
        assert_eq!(value["error_message"], "invalid URL: nope");
        assert_eq!(value["state"], "finished");
    }

    #[test]
    fn test_successful_report_omits_error_fields() {
        let report = SessionReport::new(Some("https://a.test/x.png"), SessionState::Finished);
        assert!(report.is_success());
        let value = serde_json::to_value(&report).unwrap();
        assert!(value.get("error_kind").is_none());
        assert!(value.get("error").is_none());
    }
}
