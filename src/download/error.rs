//! Error types for the download module.
//!
//! Every variant carries the URL it relates to so that failures can be
//! reported without extra bookkeeping by the caller.

use thiserror::Error;

/// Errors that can occur while fetching a single resource.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS, broken stream).
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The attempt did not finish within the per-attempt timeout.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The Retry-After header value, if present.
        retry_after: Option<String>,
    },

    /// Response body exceeded the per-file byte ceiling. The transfer was aborted.
    #[error("response from {url} exceeds size limit of {limit} bytes ({received} bytes seen)")]
    SizeExceeded {
        /// The URL being downloaded.
        url: String,
        /// Configured limit in bytes.
        limit: u64,
        /// Bytes announced by Content-Length or read before aborting.
        received: u64,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The batch was cancelled before this resource finished.
    #[error("download of {url} cancelled")]
    Cancelled {
        /// The URL whose download was cancelled.
        url: String,
    },

    /// The task running this download panicked or was aborted.
    #[error("download task for {url} failed: {reason}")]
    TaskFailed {
        /// The URL the task was fetching.
        url: String,
        /// The join error reported by the runtime.
        reason: String,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after: None,
        }
    }

    /// Creates an HTTP status error with a Retry-After header value.
    pub fn http_status_with_retry_after(
        url: impl Into<String>,
        status: u16,
        retry_after: Option<String>,
    ) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates a size-exceeded error.
    pub fn size_exceeded(url: impl Into<String>, limit: u64, received: u64) -> Self {
        Self::SizeExceeded {
            url: url.into(),
            limit,
            received,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a cancellation error.
    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::Cancelled { url: url.into() }
    }

    /// Creates an error for a task that died without producing an outcome.
    pub fn task_failed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TaskFailed {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Returns the HTTP status code, if this is an HTTP error.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the raw Retry-After header value, if the server sent one.
    #[must_use]
    pub fn retry_after(&self) -> Option<&str> {
        match self {
            Self::HttpStatus { retry_after, .. } => retry_after.as_deref(),
            _ => None,
        }
    }
}

// No From<reqwest::Error>: every variant needs the URL for context, so the
// constructors above are the conversion points.
