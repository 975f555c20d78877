//! Concurrent download pipeline for parsed resources.
//!
//! This module fetches the resources produced by [`crate::parser`] into
//! memory, a bounded number at a time, retrying transient failures with
//! exponential backoff.
//!
//! # Features
//!
//! - Bounded concurrency (1-100 simultaneous fetches)
//! - Per-attempt timeouts and per-file size caps enforced while streaming
//! - Retry with exponential backoff, honoring `Retry-After`
//! - Filename inference from the URL, `Content-Disposition`, or content hash
//! - Optional shared response cache and sliding-window rate limiter
//! - Cooperative cancellation and lifecycle events over a broadcast channel
//!
//! # Example
//!
//! ```no_run
//! use resource_harvester::download::{DownloadOptions, download_resources};
//! use resource_harvester::parser::{ParseOptions, parse_resources};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let parsed = parse_resources(
//!     r#"<img src="https://cdn.example.com/logo.png">"#,
//!     &ParseOptions::default(),
//! );
//! let result = download_resources(parsed.resources, DownloadOptions::default()).await?;
//! for success in &result.successful {
//!     println!("{} ({} bytes)", success.filename, success.size);
//! }
//! # Ok(())
//! # }
//! ```

mod cache;
mod client;
pub mod constants;
mod engine;
mod error;
mod events;
mod filename;
mod outcome;
pub mod rate_limiter;
mod retry;
mod store;

pub use cache::ResponseCache;
pub use client::{FetchConfig, FetchResponse, HttpClient};
pub use engine::{
    DEFAULT_CONCURRENCY, DownloadEngine, DownloadOptions, EngineError, download_resources,
};
pub use error::DownloadError;
pub use events::{DownloadEvent, event_channel};
pub use filename::{filename_for, resolve_unique_path, sanitize_filename, sha256_hex};
pub use outcome::{
    BatchResult, BatchSummary, DownloadFailure, DownloadOutcome, DownloadSuccess, FailureKind,
};
pub use rate_limiter::{RateLimiter, extract_domain, parse_retry_after};
pub use retry::{
    DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY, FailureType, RetryDecision, RetryOutcome,
    RetryPolicy, classify_error, with_retry,
};
pub use store::PipelineStore;

// Use `Result<T, DownloadError>` explicitly in signatures; no module-local alias.
