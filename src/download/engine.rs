//! Download scheduler for concurrent resource fetches with retry support.
//!
//! This module provides the `DownloadEngine` which runs one task per
//! resource, gated by a semaphore so no more than `concurrency` fetches are
//! in flight, with automatic retry on transient failures using exponential
//! backoff.
//!
//! # Example
//!
//! ```no_run
//! use resource_harvester::download::{DownloadEngine, DownloadOptions, HttpClient, PipelineStore};
//! use resource_harvester::parser::{ParseOptions, parse_resources};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let parsed = parse_resources(r#"<a href="https://example.com/a.pdf">A</a>"#, &ParseOptions::default());
//! let engine = DownloadEngine::new(DownloadOptions::default())?;
//! let result = engine
//!     .download_all(parsed.resources, &HttpClient::new(), &PipelineStore::new(), &CancellationToken::new())
//!     .await?;
//! println!("ok: {}, failed: {}", result.summary.successful, result.summary.failed);
//! # Ok(())
//! # }
//! ```
//!
//! # Timeouts compound
//!
//! The timeout applies to each attempt, not to the resource. In the worst
//! case one resource takes `(max_retries + 1) * timeout` plus the backoff
//! sleeps, plus any wait for a rate-limit slot.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tokio::sync::{Semaphore, broadcast};
use tokio::task::{self, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::client::{FetchConfig, FetchResponse};
use super::constants::{DEFAULT_MAX_FILE_SIZE, DEFAULT_TIMEOUT};
use super::events::{DownloadEvent, emit};
use super::filename::{filename_for, sha256_hex};
use super::outcome::{BatchResult, DownloadFailure, DownloadOutcome, DownloadSuccess};
use super::rate_limiter::extract_domain;
use super::retry::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY, RetryPolicy, with_retry};
use super::store::PipelineStore;
use super::{DownloadError, HttpClient};
use crate::parser::ParsedResource;

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 100;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Error type for download engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// A caller-supplied header name or value is not valid HTTP.
    #[error("invalid header {name:?}: {reason}")]
    InvalidHeader {
        /// Header name as given.
        name: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// The batch finished but its successful payloads exceed the aggregate cap.
    ///
    /// The complete result is attached; the caller decides whether to use it.
    #[error("batch downloaded {total} bytes, over the {limit} byte limit")]
    TotalSizeExceeded {
        /// Configured aggregate cap.
        limit: u64,
        /// Bytes actually downloaded.
        total: u64,
        /// Everything the batch produced.
        result: Box<BatchResult>,
    },
}

/// Settings for one [`DownloadEngine`].
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Maximum simultaneous fetches (1-100).
    pub concurrency: usize,
    /// Per-attempt network timeout.
    pub timeout: Duration,
    /// Retries per resource after the first attempt.
    pub max_retries: u32,
    /// Base backoff delay, doubled per retry.
    pub retry_delay: Duration,
    /// Per-resource byte ceiling.
    pub max_file_size: u64,
    /// Compute a SHA-256 digest of every payload.
    pub calculate_hash: bool,
    /// Extra request headers as `(name, value)` pairs.
    pub headers: Vec<(String, String)>,
    /// Aggregate byte cap, checked after the batch finishes.
    pub max_total_size: Option<u64>,
    /// Rate limiter key. Defaults to each URL's host.
    pub client_id: Option<String>,
    /// Mark later successes whose content hash matches an earlier one as
    /// duplicates. Implies hashing.
    pub dedupe_by_hash: bool,
    /// Where lifecycle events are sent.
    pub events: Option<broadcast::Sender<DownloadEvent>>,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            calculate_hash: false,
            headers: Vec::new(),
            max_total_size: None,
            client_id: None,
            dedupe_by_hash: false,
            events: None,
        }
    }
}

impl DownloadOptions {
    /// Sends lifecycle events to `sender`.
    #[must_use]
    pub fn with_events(mut self, sender: broadcast::Sender<DownloadEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    fn hashing(&self) -> bool {
        self.calculate_hash || self.dedupe_by_hash
    }
}

/// Download scheduler for concurrent resource fetches with retry support.
///
/// # Concurrency Model
///
/// - Each resource runs in its own Tokio task inside a `JoinSet`
/// - A semaphore permit is acquired before the first attempt (RAII release)
/// - Outcomes are collected as tasks finish, so lists are in completion order
///
/// # Retry Behavior
///
/// - Transient errors (network issues, 5xx, 408, 429) are retried with backoff
/// - Permanent errors (other 4xx, oversize bodies) fail immediately
/// - A server `Retry-After` replaces the computed backoff
#[derive(Debug)]
pub struct DownloadEngine {
    options: DownloadOptions,
    retry_policy: RetryPolicy,
    fetch_config: FetchConfig,
}

/// Read-only state shared by every task in one batch.
struct TaskContext {
    client: HttpClient,
    store: PipelineStore,
    retry_policy: RetryPolicy,
    fetch_config: FetchConfig,
    hashing: bool,
    client_id: Option<String>,
    events: Option<broadcast::Sender<DownloadEvent>>,
    cancel: CancellationToken,
}

impl DownloadEngine {
    /// Validates `options` and creates an engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if the value is outside
    /// 1-100, or [`EngineError::InvalidHeader`] if a header does not parse.
    #[instrument(level = "debug", skip(options), fields(concurrency = options.concurrency))]
    pub fn new(options: DownloadOptions) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&options.concurrency) {
            return Err(EngineError::InvalidConcurrency {
                value: options.concurrency,
            });
        }

        let fetch_config = FetchConfig {
            timeout: options.timeout,
            max_size: options.max_file_size,
            headers: build_header_map(&options.headers)?,
        };
        let retry_policy = RetryPolicy::new(options.max_retries, options.retry_delay);

        debug!(
            max_retries = options.max_retries,
            retry_delay_ms = options.retry_delay.as_millis(),
            timeout_ms = options.timeout.as_millis(),
            max_file_size = options.max_file_size,
            "creating download engine"
        );

        Ok(Self {
            options,
            retry_policy,
            fetch_config,
        })
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.options.concurrency
    }

    /// Returns the retry policy derived from the options.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Downloads every resource and aggregates the outcomes.
    ///
    /// Individual failures never abort the batch. Cancelling `cancel` aborts
    /// in-flight requests, stops further retries, and reports unstarted
    /// resources as cancelled failures.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TotalSizeExceeded`] when `max_total_size` is set
    /// and the successful payloads add up to more than it.
    #[instrument(skip_all, fields(total = resources.len()))]
    pub async fn download_all(
        &self,
        resources: Vec<ParsedResource>,
        client: &HttpClient,
        store: &PipelineStore,
        cancel: &CancellationToken,
    ) -> Result<BatchResult, EngineError> {
        let started = Instant::now();
        let total = resources.len();
        let semaphore = Arc::new(Semaphore::new(self.options.concurrency));
        let context = Arc::new(TaskContext {
            client: client.clone(),
            store: store.clone(),
            retry_policy: self.retry_policy.clone(),
            fetch_config: self.fetch_config.clone(),
            hashing: self.options.hashing(),
            client_id: self.options.client_id.clone(),
            events: self.options.events.clone(),
            cancel: cancel.clone(),
        });

        info!(
            total,
            concurrency = self.options.concurrency,
            "starting batch download"
        );

        let mut tasks = JoinSet::new();
        let mut pending: HashMap<task::Id, ParsedResource> = HashMap::with_capacity(total);
        for (index, resource) in resources.into_iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let context = Arc::clone(&context);
            let tracked = resource.clone();
            let handle = tasks.spawn(async move {
                let permit = tokio::select! {
                    biased;
                    () = context.cancel.cancelled() => None,
                    permit = semaphore.acquire_owned() => permit.ok(),
                };
                // Permit is dropped when this block exits (RAII)
                let Some(_permit) = permit else {
                    let url = resource.normalized_url.clone();
                    return DownloadOutcome::Failure(DownloadFailure::from_error(
                        resource,
                        &DownloadError::cancelled(url),
                        0,
                    ));
                };
                download_one(&context, index, resource).await
            });
            pending.insert(handle.id(), tracked);
        }

        let mut outcomes = Vec::with_capacity(total);
        let mut seen_hashes: HashMap<String, String> = HashMap::new();

        while let Some(joined) = tasks.join_next_with_id().await {
            let Some(mut outcome) = settle(joined, &mut pending) else {
                continue;
            };

            if self.options.dedupe_by_hash
                && let DownloadOutcome::Success(success) = &mut outcome
            {
                mark_duplicate(success, &mut seen_hashes);
            }

            report_outcome(self.options.events.as_ref(), &outcome);
            outcomes.push(outcome);
            emit(
                self.options.events.as_ref(),
                DownloadEvent::progress(outcomes.len(), total),
            );
        }

        let result = BatchResult::from_outcomes(outcomes, total, started.elapsed());

        info!(
            successful = result.summary.successful,
            failed = result.summary.failed,
            cancelled = result.summary.cancelled,
            retried = result.summary.retried,
            total_bytes = result.summary.total_bytes,
            elapsed_ms = result.summary.elapsed.as_millis(),
            "batch download complete"
        );

        emit(
            self.options.events.as_ref(),
            DownloadEvent::BatchComplete {
                summary: result.summary.clone(),
            },
        );

        if let Some(limit) = self.options.max_total_size
            && result.summary.total_bytes > limit
        {
            warn!(
                limit,
                total = result.summary.total_bytes,
                "batch exceeded aggregate size limit"
            );
            return Err(EngineError::TotalSizeExceeded {
                limit,
                total: result.summary.total_bytes,
                result: Box::new(result),
            });
        }

        Ok(result)
    }
}

/// Downloads `resources` with a fresh client, an empty store, and no cancellation.
///
/// # Errors
///
/// Returns [`EngineError`] if the options are invalid, the client cannot be
/// built, or the aggregate size cap is exceeded.
pub async fn download_resources(
    resources: Vec<ParsedResource>,
    options: DownloadOptions,
) -> Result<BatchResult, EngineError> {
    let engine = DownloadEngine::new(options)?;
    let client = HttpClient::try_new().map_err(EngineError::ClientBuild)?;
    engine
        .download_all(
            resources,
            &client,
            &PipelineStore::new(),
            &CancellationToken::new(),
        )
        .await
}

/// Fetches one resource through the cache, rate limiter, and retry loop.
#[instrument(skip(context, resource), fields(url = %resource.normalized_url))]
async fn download_one(
    context: &TaskContext,
    index: usize,
    resource: ParsedResource,
) -> DownloadOutcome {
    let url = resource.normalized_url.clone();
    let started = Instant::now();

    // A payload cached by a batch with a larger ceiling is not served here
    if let Some(cache) = context.store.cache()
        && let Some(cached) = cache.get(&url)
    {
        if cached.bytes.len() as u64 <= context.fetch_config.max_size {
            debug!("serving from cache");
            return DownloadOutcome::Success(build_success(
                context, resource, cached, started, 0, true,
            ));
        }
        debug!(
            size = cached.bytes.len(),
            max_size = context.fetch_config.max_size,
            "cached payload over size limit, fetching"
        );
    }

    emit(
        context.events.as_ref(),
        DownloadEvent::Started {
            url: url.clone(),
            index,
        },
    );

    let limiter_key = context
        .client_id
        .clone()
        .unwrap_or_else(|| extract_domain(&url));

    let url_ref = url.as_str();
    let key_ref = limiter_key.as_str();
    let outcome = with_retry(
        &context.retry_policy,
        &context.cancel,
        url_ref,
        move |attempt| {
            debug!(attempt, "attempting download");
            fetch_attempt(context, url_ref, key_ref)
        },
        |attempt, delay, error| {
            info!(
                url = %url,
                attempt,
                max_retries = context.retry_policy.max_retries(),
                delay_ms = delay.as_millis(),
                error = %error,
                "retrying download"
            );
            emit(
                context.events.as_ref(),
                DownloadEvent::Retrying {
                    url: url.clone(),
                    attempt,
                    delay,
                    error: error.to_string(),
                },
            );
        },
    )
    .await;

    match outcome.result {
        Ok(response) => {
            if let Some(cache) = context.store.cache() {
                cache.insert(&url, response.clone());
            }
            DownloadOutcome::Success(build_success(
                context,
                resource,
                response,
                started,
                outcome.attempts,
                false,
            ))
        }
        Err(error) => {
            warn!(
                url = %url,
                error = %error,
                attempts = outcome.attempts,
                "download failed after all attempts"
            );
            DownloadOutcome::Failure(DownloadFailure::from_error(
                resource,
                &error,
                outcome.attempts,
            ))
        }
    }
}

/// Turns a joined task into an outcome, recording a failure for tasks that
/// panicked so the resource still counts toward the batch.
fn settle(
    joined: Result<(task::Id, DownloadOutcome), JoinError>,
    pending: &mut HashMap<task::Id, ParsedResource>,
) -> Option<DownloadOutcome> {
    match joined {
        Ok((id, outcome)) => {
            pending.remove(&id);
            Some(outcome)
        }
        Err(e) => {
            warn!(error = %e, "download task panicked");
            let resource = pending.remove(&e.id())?;
            let error = DownloadError::task_failed(resource.normalized_url.clone(), e.to_string());
            Some(DownloadOutcome::Failure(DownloadFailure::from_error(
                resource, &error, 0,
            )))
        }
    }
}

async fn fetch_attempt(
    context: &TaskContext,
    url: &str,
    limiter_key: &str,
) -> Result<FetchResponse, DownloadError> {
    if let Some(limiter) = context.store.rate_limiter() {
        limiter.acquire(limiter_key).await;
    }
    context.client.fetch(url, &context.fetch_config).await
}

fn build_success(
    context: &TaskContext,
    resource: ParsedResource,
    response: FetchResponse,
    started: Instant,
    attempts: u32,
    from_cache: bool,
) -> DownloadSuccess {
    let hash = context.hashing.then(|| sha256_hex(&response.bytes));
    let filename = filename_for(
        &resource,
        &response.content_type,
        response.disposition_filename.as_deref(),
        hash.as_deref(),
    );

    DownloadSuccess {
        size: response.bytes.len() as u64,
        bytes: response.bytes,
        filename,
        mime_type: response.content_type,
        elapsed: started.elapsed(),
        completed_at: SystemTime::now(),
        hash,
        attempts,
        from_cache,
        duplicate_of: None,
        resource,
    }
}

/// Marks `success` as a duplicate if its hash was already seen, releasing its bytes.
fn mark_duplicate(success: &mut DownloadSuccess, seen_hashes: &mut HashMap<String, String>) {
    let Some(hash) = success.hash.clone() else {
        return;
    };
    match seen_hashes.entry(hash) {
        Entry::Occupied(first) => {
            debug!(
                url = %success.resource.normalized_url,
                duplicate_of = %first.get(),
                "content already downloaded"
            );
            success.duplicate_of = Some(first.get().clone());
            success.bytes = Vec::new();
        }
        Entry::Vacant(slot) => {
            slot.insert(success.resource.normalized_url.clone());
        }
    }
}

fn report_outcome(events: Option<&broadcast::Sender<DownloadEvent>>, outcome: &DownloadOutcome) {
    let event = match outcome {
        DownloadOutcome::Success(success) => DownloadEvent::Succeeded {
            url: success.resource.normalized_url.clone(),
            filename: success.filename.clone(),
            size: success.size,
            from_cache: success.from_cache,
        },
        DownloadOutcome::Failure(failure) => DownloadEvent::Failed {
            url: failure.resource.normalized_url.clone(),
            kind: failure.kind,
            error: failure.error.clone(),
        },
    };
    emit(events, event);
}

fn build_header_map(headers: &[(String, String)]) -> Result<HeaderMap, EngineError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name =
            HeaderName::from_bytes(name.trim().as_bytes()).map_err(|e| EngineError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        let header_value =
            HeaderValue::from_str(value.trim()).map_err(|e| EngineError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::download::FailureKind;
    use crate::parser::{ResourceContext, ResourceOrigin, ResourceType};

    #[test]
    fn test_engine_new_valid_concurrency() {
        for concurrency in [1, DEFAULT_CONCURRENCY, 100] {
            let engine = DownloadEngine::new(DownloadOptions {
                concurrency,
                ..DownloadOptions::default()
            })
            .unwrap();
            assert_eq!(engine.concurrency(), concurrency);
        }
    }

    #[test]
    fn test_engine_new_invalid_concurrency() {
        for concurrency in [0, 101] {
            let result = DownloadEngine::new(DownloadOptions {
                concurrency,
                ..DownloadOptions::default()
            });
            assert!(matches!(
                result,
                Err(EngineError::InvalidConcurrency { value }) if value == concurrency
            ));
        }
    }

    #[test]
    fn test_engine_error_display() {
        let error = EngineError::InvalidConcurrency { value: 0 };
        assert!(error.to_string().contains("between 1 and 100"));
    }

    #[test]
    fn test_default_options_match_documented_defaults() {
        let options = DownloadOptions::default();
        assert_eq!(options.concurrency, 3);
        assert_eq!(options.max_retries, 3);
        assert_eq!(options.retry_delay, Duration::from_millis(1000));
        assert_eq!(options.timeout, Duration::from_millis(30_000));
        assert_eq!(options.max_file_size, 50 * 1024 * 1024);
        assert!(!options.calculate_hash);
        assert!(options.max_total_size.is_none());
    }

    #[test]
    fn test_engine_retry_policy_from_options() {
        let engine = DownloadEngine::new(DownloadOptions {
            max_retries: 5,
            retry_delay: Duration::from_millis(250),
            ..DownloadOptions::default()
        })
        .unwrap();
        assert_eq!(engine.retry_policy().max_retries(), 5);
        assert_eq!(engine.retry_policy().base_delay(), Duration::from_millis(250));
    }

    #[test]
    fn test_build_header_map_accepts_valid_headers() {
        let map = build_header_map(&[
            ("Accept".to_string(), "application/pdf".to_string()),
            (" X-Source ".to_string(), " newsletter ".to_string()),
        ])
        .unwrap();
        assert_eq!(map.get("accept").unwrap(), "application/pdf");
        assert_eq!(map.get("x-source").unwrap(), "newsletter");
    }

    #[test]
    fn test_build_header_map_rejects_bad_name() {
        let result = build_header_map(&[("Bad Header".to_string(), "v".to_string())]);
        assert!(matches!(
            result,
            Err(EngineError::InvalidHeader { name, .. }) if name == "Bad Header"
        ));
    }

    #[test]
    fn test_build_header_map_rejects_bad_value() {
        let result = build_header_map(&[("X-Ok".to_string(), "line\nbreak".to_string())]);
        assert!(matches!(result, Err(EngineError::InvalidHeader { .. })));
    }

    #[test]
    fn test_engine_new_rejects_invalid_header() {
        let result = DownloadEngine::new(DownloadOptions {
            headers: vec![("".to_string(), "x".to_string())],
            ..DownloadOptions::default()
        });
        assert!(matches!(result, Err(EngineError::InvalidHeader { .. })));
    }

    #[test]
    fn test_dedupe_by_hash_implies_hashing() {
        let options = DownloadOptions {
            dedupe_by_hash: true,
            ..DownloadOptions::default()
        };
        assert!(options.hashing());
        assert!(!DownloadOptions::default().hashing());
    }

    #[test]
    fn test_download_resources_rejects_invalid_options() {
        let result = tokio_test::block_on(download_resources(
            Vec::new(),
            DownloadOptions {
                concurrency: 0,
                ..DownloadOptions::default()
            },
        ));
        assert!(matches!(
            result,
            Err(EngineError::InvalidConcurrency { value: 0 })
        ));
    }

    #[tokio::test]
    async fn test_download_all_empty_batch() {
        let engine = DownloadEngine::new(DownloadOptions::default()).unwrap();
        let result = engine
            .download_all(
                Vec::new(),
                &HttpClient::new(),
                &PipelineStore::new(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.summary.total, 0);
        assert_eq!(result.summary.successful, 0);
        assert_eq!(result.summary.failed, 0);
        assert_eq!(result.summary.total_bytes, 0);
    }

    fn resource(url: &str) -> ParsedResource {
        ParsedResource {
            source_url: url.to_string(),
            normalized_url: url.to_string(),
            resource_type: ResourceType::Pdf,
            extension: ".pdf".to_string(),
            origin: ResourceOrigin {
                tag: "a".to_string(),
                attribute: "href".to_string(),
                snippet: String::new(),
            },
            context: ResourceContext::default(),
            is_external: true,
            position: 0,
        }
    }

    #[allow(clippy::unused_async)]
    async fn exploding_fetch() -> DownloadOutcome {
        panic!("fetch blew up")
    }

    #[tokio::test]
    async fn test_settle_turns_panicked_task_into_failure() {
        let url = "https://example.com/panics.pdf";
        let mut tasks: JoinSet<DownloadOutcome> = JoinSet::new();
        let mut pending = HashMap::new();
        let handle = tasks.spawn(exploding_fetch());
        pending.insert(handle.id(), resource(url));

        let joined = tasks.join_next_with_id().await.unwrap();
        let outcome = settle(joined, &mut pending).unwrap();

        let DownloadOutcome::Failure(failure) = outcome else {
            panic!("expected a failure outcome");
        };
        assert_eq!(failure.resource.normalized_url, url);
        assert_eq!(failure.kind, FailureKind::TaskFailed);
        assert_eq!(failure.attempts, 0);
        assert!(pending.is_empty());

        let result = BatchResult::from_outcomes(
            vec![DownloadOutcome::Failure(failure)],
            1,
            Duration::ZERO,
        );
        assert_eq!(
            result.summary.total,
            result.successful.len() + result.failed.len()
        );
    }

    #[tokio::test]
    async fn test_settle_forgets_completed_task() {
        let mut tasks: JoinSet<DownloadOutcome> = JoinSet::new();
        let mut pending = HashMap::new();
        let failure = DownloadFailure::from_error(
            resource("https://example.com/a.pdf"),
            &DownloadError::timeout("https://example.com/a.pdf"),
            1,
        );
        let handle = tasks.spawn(async move { DownloadOutcome::Failure(failure) });
        pending.insert(handle.id(), resource("https://example.com/a.pdf"));

        let joined = tasks.join_next_with_id().await.unwrap();
        let outcome = settle(joined, &mut pending).unwrap();
        assert!(matches!(outcome, DownloadOutcome::Failure(f) if f.kind == FailureKind::Timeout));
        assert!(pending.is_empty());
    }
}
