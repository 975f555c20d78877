//! Constants for the download module (timeouts, size caps, cache and limiter defaults).

use std::time::Duration;

/// Default per-attempt network timeout (connect + transfer).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default HTTP connect timeout applied at the client level.
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default per-resource byte ceiling (50 MB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Content type reported when the server sends none.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Default time-to-live for cached responses (15 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(15 * 60);

/// Cache size above which an insert triggers an expiry sweep.
pub const DEFAULT_CACHE_SWEEP_THRESHOLD: usize = 256;

/// Tracked limiter keys above which a new key triggers an idle-key sweep.
pub const DEFAULT_LIMITER_SWEEP_THRESHOLD: usize = 256;

/// Maximum Retry-After header value (1 hour) to prevent excessive delays.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Capacity of the download event channel. Lagging subscribers drop events.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;
