//! Retry policy for gateway-timeout (HTTP 504) failures.
//!
//! Only one failure class is worth retrying: a gateway reporting that the
//! upstream timed out (HTTP 504). Everything else, including an attempt that
//! runs past its own time budget, fails on the first attempt.
//!
//! # Example
//!
//! ```
//! use imgcache_core::download::{DownloadError, FailureType, RetryDecision, RetryPolicy, classify_error};
//!
//! let policy = RetryPolicy::default();
//! let error = DownloadError::http_status("https://example.com/a.png", 504);
//! assert_eq!(classify_error(&error), FailureType::Transient);
//!
//! match policy.should_retry(classify_error(&error), 1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         println!("Retrying in {:?} (attempt {})", delay, attempt);
//!     }
//!     RetryDecision::DoNotRetry { reason } => {
//!         println!("Not retrying: {}", reason);
//!     }
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument};

use super::DownloadError;
use super::constants::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BASE_DELAY, MAX_RETRY_DELAY, MAX_RETRY_JITTER,
};

/// HTTP status signalling an upstream timeout.
const GATEWAY_TIMEOUT: u16 = 504;

/// Classification of download failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Upstream timeout; another attempt may succeed.
    Transient,

    /// Any other failure; retrying would not help.
    Fatal,
}

/// Decision on whether to retry a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// The attempt number about to start (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Stop and surface the failure.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Bounded retry configuration with exponential backoff.
///
/// Delay before attempt `n + 1` is `min(base_delay * 2^(n-1), 8s)` plus up
/// to `min(base_delay, 100ms)` of jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,

    /// Delay before the first retry.
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_RETRY_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy. `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Creates a policy with a custom `max_attempts` and the default delay.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self::new(max_attempts, DEFAULT_RETRY_BASE_DELAY)
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decides whether to retry after attempt `attempt` (1-indexed) failed.
    #[instrument(skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if failure_type == FailureType::Fatal {
            return RetryDecision::DoNotRetry {
                reason: "fatal failure - retry would not help".to_string(),
            };
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        let delay = self.calculate_delay(attempt);
        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let backoff = self
            .base_delay
            .saturating_mul(1 << exponent)
            .min(MAX_RETRY_DELAY);
        backoff + self.calculate_jitter()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn calculate_jitter(&self) -> Duration {
        let bound = self.base_delay.min(MAX_RETRY_JITTER).as_millis() as u64;
        if bound == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=bound))
    }
}

/// Classifies a download error for retry decisions.
///
/// | Error | Type |
/// |-------|------|
/// | HTTP 504 | Transient |
/// | Any other HTTP status | Fatal |
/// | Attempt timeout | Fatal |
/// | Network (connect, TLS, reset) | Fatal |
/// | Cancelled / exhausted | Fatal |
#[must_use]
pub fn classify_error(error: &DownloadError) -> FailureType {
    match error {
        DownloadError::HttpStatus { status, .. } if *status == GATEWAY_TIMEOUT => {
            FailureType::Transient
        }
        DownloadError::HttpStatus { .. }
        | DownloadError::Timeout { .. }
        | DownloadError::Network { .. }
        | DownloadError::RetriesExhausted { .. }
        | DownloadError::Cancelled { .. } => FailureType::Fatal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://example.com/a.png";

    #[test]
    fn test_default_policy_allows_three_attempts() {
        assert_eq!(RetryPolicy::default().max_attempts(), 3);
    }

    #[test]
    fn test_zero_max_attempts_is_clamped_to_one() {
        assert_eq!(RetryPolicy::with_max_attempts(0).max_attempts(), 1);
    }

    #[test]
    fn test_transient_retries_until_max_attempts() {
        let policy = RetryPolicy::new(3, Duration::ZERO);

        assert_eq!(
            policy.should_retry(FailureType::Transient, 1),
            RetryDecision::Retry {
                delay: Duration::ZERO,
                attempt: 2
            }
        );
        assert!(matches!(
            policy.should_retry(FailureType::Transient, 2),
            RetryDecision::Retry { attempt: 3, .. }
        ));
        assert!(matches!(
            policy.should_retry(FailureType::Transient, 3),
            RetryDecision::DoNotRetry { .. }
        ));
    }

    #[test]
    fn test_fatal_never_retries() {
        let policy = RetryPolicy::new(5, Duration::ZERO);
        match policy.should_retry(FailureType::Fatal, 1) {
            RetryDecision::DoNotRetry { reason } => assert!(reason.contains("fatal")),
            other => panic!("Expected DoNotRetry, got: {other:?}"),
        }
    }

    #[test]
    fn test_delay_doubles_and_is_capped() {
        let policy = RetryPolicy::new(20, Duration::from_secs(1));

        let first = policy.calculate_delay(1);
        assert!(first >= Duration::from_secs(1));
        assert!(first <= Duration::from_millis(1100));

        let second = policy.calculate_delay(2);
        assert!(second >= Duration::from_secs(2));
        assert!(second <= Duration::from_millis(2100));

        let late = policy.calculate_delay(12);
        assert!(late >= MAX_RETRY_DELAY);
        assert!(late <= MAX_RETRY_DELAY + MAX_RETRY_JITTER);
    }

    #[test]
    fn test_zero_base_delay_has_no_jitter() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        for attempt in 1..=3 {
            assert_eq!(policy.calculate_delay(attempt), Duration::ZERO);
        }
    }

    #[test]
    fn test_classify_gateway_timeout_transient() {
        let error = DownloadError::http_status(URL, 504);
        assert_eq!(classify_error(&error), FailureType::Transient);
    }

    #[test]
    fn test_classify_attempt_timeout_fatal() {
        assert_eq!(
            classify_error(&DownloadError::timeout(URL)),
            FailureType::Fatal
        );
    }

    #[test]
    fn test_classify_other_statuses_fatal() {
        for status in [400, 403, 404, 408, 429, 500, 502, 503] {
            let error = DownloadError::http_status(URL, status);
            assert_eq!(
                classify_error(&error),
                FailureType::Fatal,
                "status {status} should be fatal"
            );
        }
    }

    #[test]
    fn test_classify_cancelled_fatal() {
        assert_eq!(
            classify_error(&DownloadError::cancelled(URL)),
            FailureType::Fatal
        );
    }
}
