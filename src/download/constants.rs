//! Constants for the download module (timeouts, attempts, backoff).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default time budget for one attempt, connect through last byte.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default total attempts, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the first retry.
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

/// Cap on the exponential retry delay.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(8);

/// Upper bound on random jitter added to each retry delay.
pub const MAX_RETRY_JITTER: Duration = Duration::from_millis(100);

/// Progress reported while bytes are still streaming never exceeds this;
/// 100 is reserved for "available locally".
pub const STREAMING_PROGRESS_CAP: u8 = 99;

/// User-Agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("imgcache/", env!("CARGO_PKG_VERSION"));
