//! Shared state injected into the download scheduler.

use std::sync::Arc;

use super::cache::ResponseCache;
use super::rate_limiter::RateLimiter;

/// Optional response cache and rate limiter shared across batches.
///
/// Both parts are `Send + Sync` and held behind `Arc`, so a store can be
/// cloned into every batch that should share them. The default store has
/// neither.
#[derive(Debug, Clone, Default)]
pub struct PipelineStore {
    cache: Option<Arc<ResponseCache>>,
    rate_limiter: Option<Arc<RateLimiter>>,
}

impl PipelineStore {
    /// Creates a store with no cache and no rate limiter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a response cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Attaches a rate limiter. Disabled limiters are ignored.
    #[must_use]
    pub fn with_rate_limiter(mut self, rate_limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = (!rate_limiter.is_disabled()).then_some(rate_limiter);
        self
    }

    /// The attached cache, if any.
    #[must_use]
    pub fn cache(&self) -> Option<&Arc<ResponseCache>> {
        self.cache.as_ref()
    }

    /// The attached, enabled rate limiter, if any.
    #[must_use]
    pub fn rate_limiter(&self) -> Option<&Arc<RateLimiter>> {
        self.rate_limiter.as_ref()
    }
}
