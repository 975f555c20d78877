//! In-memory response cache with time-to-live expiry.
//!
//! Keyed by normalized URL. Expired entries are dropped lazily when looked
//! up, and all at once when an insert pushes the map past its sweep
//! threshold.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use super::client::FetchResponse;
use super::constants::{DEFAULT_CACHE_SWEEP_THRESHOLD, DEFAULT_CACHE_TTL};

/// A cached response and when it was stored.
#[derive(Debug, Clone)]
struct CachedResponse {
    response: FetchResponse,
    stored_at: Instant,
}

impl CachedResponse {
    fn is_valid(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() < ttl
    }
}

/// Concurrent TTL cache of successful fetches.
///
/// `Send + Sync`; share it behind an `Arc` across batches.
#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    sweep_threshold: usize,
    entries: DashMap<String, CachedResponse>,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl ResponseCache {
    /// Creates an empty cache whose entries live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sweep_threshold: DEFAULT_CACHE_SWEEP_THRESHOLD,
            entries: DashMap::new(),
        }
    }

    /// Sets the size above which inserts trigger a full expiry sweep.
    #[must_use]
    pub fn with_sweep_threshold(mut self, threshold: usize) -> Self {
        self.sweep_threshold = threshold;
        self
    }

    /// Returns the entry time-to-live.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns a fresh cached response for `url`, evicting it if stale.
    #[must_use]
    pub fn get(&self, url: &str) -> Option<FetchResponse> {
        if let Some(entry) = self.entries.get(url)
            && entry.is_valid(self.ttl)
        {
            return Some(entry.response.clone());
        }

        if self
            .entries
            .remove_if(url, |_, entry| !entry.is_valid(self.ttl))
            .is_some()
        {
            debug!(url, "evicted stale cache entry");
        }
        None
    }

    /// Stores `response` under `url`, replacing any previous entry.
    pub fn insert(&self, url: &str, response: FetchResponse) {
        self.entries.insert(
            url.to_string(),
            CachedResponse {
                response,
                stored_at: Instant::now(),
            },
        );

        if self.entries.len() > self.sweep_threshold {
            self.sweep_expired();
        }
    }

    /// Drops every expired entry, returning how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_valid(self.ttl));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, remaining = self.entries.len(), "swept expired cache entries");
        }
        removed
    }

    /// Number of stored entries, including any not yet evicted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }
}
