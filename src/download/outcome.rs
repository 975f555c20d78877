//! Per-resource outcomes and the aggregated batch result.

use std::fmt;
use std::time::{Duration, SystemTime};

use serde::Serialize;

use super::error::DownloadError;
use crate::parser::ParsedResource;

/// Result of downloading one resource.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DownloadOutcome {
    /// The payload was fetched.
    Success(DownloadSuccess),
    /// Every attempt failed, or the batch was cancelled first.
    Failure(DownloadFailure),
}

impl DownloadOutcome {
    /// The resource this outcome belongs to.
    #[must_use]
    pub fn resource(&self) -> &ParsedResource {
        match self {
            Self::Success(success) => &success.resource,
            Self::Failure(failure) => &failure.resource,
        }
    }

    /// Attempts made, including the first.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Success(success) => success.attempts,
            Self::Failure(failure) => failure.attempts,
        }
    }

    /// Whether this is a success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// A fetched payload ready for handoff.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadSuccess {
    /// Response body.
    #[serde(skip)]
    pub bytes: Vec<u8>,
    /// Inferred filename.
    pub filename: String,
    /// MIME type reported by the server.
    pub mime_type: String,
    /// Payload size in bytes.
    pub size: u64,
    /// Wall time from first attempt to completion.
    pub elapsed: Duration,
    /// When the download finished.
    pub completed_at: SystemTime,
    /// Lowercase hex SHA-256 of the payload, when hashing is enabled.
    pub hash: Option<String>,
    /// Attempts made, including the first. Zero for cache hits.
    pub attempts: u32,
    /// Whether the payload came from the response cache.
    pub from_cache: bool,
    /// URL of an earlier success with the same content hash. When set, the
    /// bytes were released and only this reference is kept.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<String>,
    /// The resource that was downloaded.
    pub resource: ParsedResource,
}

/// A resource that could not be downloaded.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadFailure {
    /// The resource that failed.
    pub resource: ParsedResource,
    /// Human-readable error.
    pub error: String,
    /// Failure category.
    pub kind: FailureKind,
    /// HTTP status, when the server answered with an error.
    pub status: Option<u16>,
    /// Attempts made. Zero when cancelled before starting.
    pub attempts: u32,
    /// When the failure was recorded.
    pub failed_at: SystemTime,
}

impl DownloadFailure {
    /// Builds a failure record from the last error seen.
    #[must_use]
    pub fn from_error(resource: ParsedResource, error: &DownloadError, attempts: u32) -> Self {
        Self {
            resource,
            error: error.to_string(),
            kind: FailureKind::from(error),
            status: error.status(),
            attempts,
            failed_at: SystemTime::now(),
        }
    }
}

/// Category of a download failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// An attempt exceeded its timeout.
    Timeout,
    /// Connection, DNS, TLS or stream error.
    Network,
    /// Server answered with a non-success status.
    HttpError,
    /// Body exceeded the per-file limit.
    SizeExceeded,
    /// URL could not be requested.
    InvalidUrl,
    /// The batch was cancelled.
    Cancelled,
    /// The download task panicked.
    TaskFailed,
}

impl From<&DownloadError> for FailureKind {
    fn from(error: &DownloadError) -> Self {
        match error {
            DownloadError::Timeout { .. } => Self::Timeout,
            DownloadError::Network { .. } => Self::Network,
            DownloadError::HttpStatus { .. } => Self::HttpError,
            DownloadError::SizeExceeded { .. } => Self::SizeExceeded,
            DownloadError::InvalidUrl { .. } => Self::InvalidUrl,
            DownloadError::Cancelled { .. } => Self::Cancelled,
            DownloadError::TaskFailed { .. } => Self::TaskFailed,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Timeout => "timeout",
            Self::Network => "network",
            Self::HttpError => "http_error",
            Self::SizeExceeded => "size_exceeded",
            Self::InvalidUrl => "invalid_url",
            Self::Cancelled => "cancelled",
            Self::TaskFailed => "task_failed",
        };
        f.write_str(name)
    }
}

/// Aggregate counters for one scheduler run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Resources submitted.
    pub total: usize,
    /// Resources downloaded.
    pub successful: usize,
    /// Resources that failed, cancelled ones included.
    pub failed: usize,
    /// Bytes across all successes.
    pub total_bytes: u64,
    /// Wall time of the whole batch.
    pub elapsed: Duration,
    /// Retry attempts made across the batch (attempts beyond the first).
    pub retried: u32,
    /// Failures caused by cancellation.
    pub cancelled: usize,
}

/// Everything one scheduler run produced. Both lists are in completion order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResult {
    /// Successful downloads.
    pub successful: Vec<DownloadSuccess>,
    /// Failed downloads.
    pub failed: Vec<DownloadFailure>,
    /// Counters.
    pub summary: BatchSummary,
}

impl BatchResult {
    /// Builds a result from outcomes in completion order.
    #[must_use]
    pub fn from_outcomes(outcomes: Vec<DownloadOutcome>, total: usize, elapsed: Duration) -> Self {
        let mut result = Self::default();

        for outcome in outcomes {
            result.summary.retried += outcome.attempts().saturating_sub(1);
            match outcome {
                DownloadOutcome::Success(success) => {
                    result.summary.total_bytes += success.size;
                    result.successful.push(success);
                }
                DownloadOutcome::Failure(failure) => {
                    if failure.kind == FailureKind::Cancelled {
                        result.summary.cancelled += 1;
                    }
                    result.failed.push(failure);
                }
            }
        }

        result.summary.total = total;
        result.summary.successful = result.successful.len();
        result.summary.failed = result.failed.len();
        result.summary.elapsed = elapsed;
        result
    }

    /// Whether every submitted resource succeeded.
    #[must_use]
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}
