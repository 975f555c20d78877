//! Sliding-window request rate limiting.
//!
//! This module provides the [`RateLimiter`] struct which allows at most
//! `max_requests` requests per `window` for each client key. The download
//! scheduler keys requests by the configured client id, or by the URL's host
//! when no client id is set.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use resource_harvester::download::RateLimiter;
//!
//! let limiter = RateLimiter::new(2, Duration::from_secs(60));
//! assert!(limiter.try_acquire("newsletter-bot"));
//! assert!(limiter.try_acquire("newsletter-bot"));
//! assert!(!limiter.try_acquire("newsletter-bot"));
//!
//! // Keys are independent.
//! assert!(limiter.try_acquire("other-client"));
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use super::constants::{DEFAULT_LIMITER_SWEEP_THRESHOLD, MAX_RETRY_AFTER};

/// Warning threshold for a single wait on a saturated key (30 seconds).
const LONG_WAIT_WARNING_THRESHOLD: Duration = Duration::from_secs(30);

/// Sliding-window rate limiter keyed by client id.
///
/// This struct is designed to be wrapped in `Arc` and shared across multiple
/// Tokio tasks. `DashMap` shards the per-key state; each key's request log is
/// behind its own short-lived `Mutex` that is never held across an await.
#[derive(Debug)]
pub struct RateLimiter {
    /// Requests allowed per window.
    max_requests: usize,

    /// Length of the sliding window.
    window: Duration,

    /// Whether rate limiting is disabled.
    disabled: bool,

    /// Key count at which adding a new key first drops idle keys.
    sweep_threshold: usize,

    /// Per-key timestamps of requests inside the current window, oldest first.
    /// Arc lets callers release the `DashMap` shard before locking.
    clients: DashMap<String, Arc<Mutex<VecDeque<Instant>>>>,
}

impl RateLimiter {
    /// Creates a limiter allowing `max_requests` per `window` for each key.
    ///
    /// A `max_requests` of zero or a zero `window` yields a disabled limiter.
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            disabled: max_requests == 0 || window.is_zero(),
            sweep_threshold: DEFAULT_LIMITER_SWEEP_THRESHOLD,
            clients: DashMap::new(),
        }
    }

    /// Sets the key count at which new keys trigger [`Self::sweep_idle`].
    #[must_use]
    pub fn with_sweep_threshold(mut self, threshold: usize) -> Self {
        self.sweep_threshold = threshold;
        self
    }

    /// Creates a limiter that admits every request.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Returns whether this limiter admits everything.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Returns the configured window length.
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Records a request for `key` if the window has room.
    ///
    /// Returns `false` without recording anything when the key is saturated.
    #[instrument(skip(self))]
    pub fn try_acquire(&self, key: &str) -> bool {
        self.check(key).is_ok()
    }

    /// Waits until `key` has room in its window, then records the request.
    #[instrument(skip(self))]
    pub async fn acquire(&self, key: &str) {
        loop {
            match self.check(key) {
                Ok(()) => return,
                Err(wait) => {
                    if wait >= LONG_WAIT_WARNING_THRESHOLD {
                        warn!(
                            key,
                            wait_secs = wait.as_secs(),
                            "rate limit saturated - long wait for next slot"
                        );
                    } else {
                        debug!(key, wait_ms = wait.as_millis(), "waiting for rate limit slot");
                    }
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Returns how many more requests `key` may make right now.
    #[must_use]
    pub fn remaining(&self, key: &str) -> usize {
        if self.disabled {
            return usize::MAX;
        }
        let Some(log) = self.clients.get(key).map(|entry| Arc::clone(entry.value())) else {
            return self.max_requests;
        };
        let mut log = log.lock().unwrap_or_else(PoisonError::into_inner);
        self.evict_expired(&mut log, Instant::now());
        self.max_requests.saturating_sub(log.len())
    }

    /// Returns the number of keys currently tracked.
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.clients.len()
    }

    /// Drops keys with no requests left in their window. Returns how many
    /// were removed.
    ///
    /// A key whose log is held by a caller at sweep time is kept.
    pub fn sweep_idle(&self) -> usize {
        let before = self.clients.len();
        let now = Instant::now();
        self.clients.retain(|_, log| {
            if Arc::strong_count(log) > 1 {
                return true;
            }
            match log.try_lock() {
                Ok(mut log) => {
                    self.evict_expired(&mut log, now);
                    !log.is_empty()
                }
                Err(_) => true,
            }
        });
        let removed = before.saturating_sub(self.clients.len());
        if removed > 0 {
            debug!(removed, remaining = self.clients.len(), "swept idle rate limiter keys");
        }
        removed
    }

    /// Admits and records a request, or returns how long until the oldest
    /// request leaves the window.
    fn check(&self, key: &str) -> Result<(), Duration> {
        if self.disabled {
            return Ok(());
        }

        if self.clients.len() >= self.sweep_threshold && !self.clients.contains_key(key) {
            self.sweep_idle();
        }

        let log = self
            .clients
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(VecDeque::new())))
            .clone();
        let mut log = log.lock().unwrap_or_else(PoisonError::into_inner);

        let now = Instant::now();
        self.evict_expired(&mut log, now);

        if log.len() < self.max_requests {
            log.push_back(now);
            return Ok(());
        }

        let wait = log.front().map_or(self.window, |oldest| {
            (*oldest + self.window).saturating_duration_since(now)
        });
        // Never spin on a zero wait.
        Err(wait.max(Duration::from_millis(1)))
    }

    fn evict_expired(&self, log: &mut VecDeque<Instant>, now: Instant) {
        while log
            .front()
            .is_some_and(|oldest| now.saturating_duration_since(*oldest) >= self.window)
        {
            log.pop_front();
        }
    }
}

/// Extracts the lowercase host from a URL, used as the default limiter key.
///
/// Returns "unknown" for malformed URLs, ensuring all requests are still
/// rate limited even if the URL cannot be parsed.
///
/// # Examples
///
/// ```
/// use resource_harvester::download::extract_domain;
///
/// assert_eq!(extract_domain("https://example.com/path"), "example.com");
/// assert_eq!(extract_domain("http://Example.COM/Path"), "example.com");
/// assert_eq!(extract_domain("not a url"), "unknown");
/// ```
#[must_use]
pub fn extract_domain(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Parses a Retry-After header value into a Duration.
///
/// Supports two formats as per RFC 7231:
/// - Integer seconds: `Retry-After: 120`
/// - HTTP-date: `Retry-After: Wed, 21 Oct 2025 07:28:00 GMT`
///
/// Returns `None` if the value cannot be parsed. Caps excessive values at 1 hour.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use resource_harvester::download::parse_retry_after;
///
/// assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
/// assert_eq!(parse_retry_after("0"), Some(Duration::ZERO));
/// assert_eq!(parse_retry_after("invalid"), None);
/// ```
#[must_use]
#[instrument]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    // Integer seconds first (most common)
    if let Ok(seconds) = header_value.parse::<i64>() {
        if seconds < 0 {
            debug!(seconds, "negative Retry-After value, ignoring");
            return None;
        }

        #[allow(clippy::cast_sign_loss)]
        let duration = Duration::from_secs(seconds as u64);

        if duration > MAX_RETRY_AFTER {
            warn!(
                seconds,
                max_seconds = MAX_RETRY_AFTER.as_secs(),
                "Retry-After exceeds maximum, capping at 1 hour"
            );
            return Some(MAX_RETRY_AFTER);
        }

        return Some(duration);
    }

    if let Ok(datetime) = httpdate::parse_http_date(header_value) {
        let now = std::time::SystemTime::now();

        if let Ok(duration) = datetime.duration_since(now) {
            if duration > MAX_RETRY_AFTER {
                warn!(
                    delay_secs = duration.as_secs(),
                    max_secs = MAX_RETRY_AFTER.as_secs(),
                    "Retry-After date exceeds maximum, capping at 1 hour"
                );
                return Some(MAX_RETRY_AFTER);
            }
            Some(duration)
        } else {
            debug!(header_value, "Retry-After date is in the past, returning zero");
            Some(Duration::ZERO)
        }
    } else {
        debug!(header_value, "unparseable Retry-After value");
        None
    }
}
