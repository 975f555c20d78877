//! Resource Harvester Library
//!
//! This library extracts references to downloadable resources (PDFs, office
//! documents, images) from newsletter-style HTML and fetches them
//! concurrently into memory for downstream processing.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`parser`] - HTML scanning, URL normalization and deduplication
//! - [`download`] - Bounded-concurrency fetches with retry, cache and rate limiting
//!
//! # Example
//!
//! ```no_run
//! use resource_harvester::{DownloadOptions, ParseOptions, download_resources, parse_resources};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let html = r#"<a href="https://cdn.example.org/issue.pdf">Issue</a>"#;
//! let parsed = parse_resources(html, &ParseOptions::default().with_base_url("https://news.example.com")?);
//! let batch = download_resources(parsed.resources, DownloadOptions::default()).await?;
//! assert_eq!(batch.summary.total, batch.successful.len() + batch.failed.len());
//! # Ok(())
//! # }
//! ```

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
pub mod parser;
pub(crate) mod user_agent;

#[cfg(test)]
pub mod test_support;

// Re-export commonly used types
pub use download::{
    BatchResult, BatchSummary, DEFAULT_CONCURRENCY, DEFAULT_MAX_RETRIES, DownloadEngine,
    DownloadError, DownloadEvent, DownloadFailure, DownloadOptions, DownloadSuccess, EngineError,
    FailureKind, HttpClient, PipelineStore, RateLimiter, ResponseCache, RetryPolicy,
    download_resources,
};
pub use parser::{
    ParseDiagnostic, ParseError, ParseOptions, ParseResult, ParsedResource, ResourceType,
    parse_resources,
};
