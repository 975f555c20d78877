//! Error types for URL normalization during resource parsing.
//!
//! None of these abort a parse. The parser converts each one into a
//! [`ParseDiagnostic`](super::ParseDiagnostic) and drops the offending reference.

use thiserror::Error;

use super::resource::DiagnosticKind;

/// Default maximum URL length accepted by the normalizer.
pub const DEFAULT_MAX_URL_LENGTH: usize = 2048;

/// Number of characters kept when previewing an over-long URL.
const URL_PREVIEW_CHARS: usize = 50;

/// Errors that can occur while normalizing a resource reference.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Reference is empty, malformed, relative without a base, or hostless.
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The reference as written in markup.
        url: String,
        /// Why the URL is invalid.
        reason: String,
    },

    /// Reference exceeds the configured maximum length.
    #[error("URL too long ({length} chars, max {max}): {url_preview}...")]
    UrlTooLong {
        /// Truncated URL for display.
        url_preview: String,
        /// Actual length in characters.
        length: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// Reference resolves to a scheme other than http/https.
    #[error("unsupported scheme '{scheme}' in URL '{url}'")]
    UnsupportedScheme {
        /// The reference as written in markup.
        url: String,
        /// The rejected scheme.
        scheme: String,
    },
}

impl ParseError {
    /// Creates an `InvalidUrl` error for an empty or whitespace-only reference.
    #[must_use]
    pub fn empty(url: &str) -> Self {
        Self::InvalidUrl {
            url: url.to_string(),
            reason: "URL is empty".to_string(),
        }
    }

    /// Creates an `InvalidUrl` error for a syntactically malformed reference.
    #[must_use]
    pub fn malformed(url: &str, parse_error: &str) -> Self {
        Self::InvalidUrl {
            url: url.to_string(),
            reason: parse_error.to_string(),
        }
    }

    /// Creates an `InvalidUrl` error for a relative reference with no base URL.
    #[must_use]
    pub fn relative_without_base(url: &str) -> Self {
        Self::InvalidUrl {
            url: url.to_string(),
            reason: "relative URL without a base URL".to_string(),
        }
    }

    /// Creates an `InvalidUrl` error for a URL without a host.
    #[must_use]
    pub fn no_host(url: &str) -> Self {
        Self::InvalidUrl {
            url: url.to_string(),
            reason: "URL has no host".to_string(),
        }
    }

    /// Creates an `UnsupportedScheme` error.
    #[must_use]
    pub fn unsupported_scheme(url: &str, scheme: &str) -> Self {
        Self::UnsupportedScheme {
            url: url.to_string(),
            scheme: scheme.to_string(),
        }
    }

    /// Creates a `UrlTooLong` error for URLs exceeding `max` characters.
    #[must_use]
    pub fn too_long(url: &str, max: usize) -> Self {
        Self::UrlTooLong {
            url_preview: url.chars().take(URL_PREVIEW_CHARS).collect(),
            length: url.chars().count(),
            max,
        }
    }

    /// Returns the diagnostic kind this error is reported under.
    #[must_use]
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            Self::InvalidUrl { .. } => DiagnosticKind::InvalidUrl,
            Self::UrlTooLong { .. } => DiagnosticKind::UrlTooLong,
            Self::UnsupportedScheme { .. } => DiagnosticKind::UnsupportedScheme,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_unsupported_scheme_message() {
        let err = ParseError::unsupported_scheme("ftp://example.com/a.pdf", "ftp");
        let msg = err.to_string();
        assert!(msg.contains("ftp://example.com/a.pdf"), "should contain URL");
        assert!(msg.contains("'ftp'"), "should contain scheme");
        assert_eq!(err.kind(), DiagnosticKind::UnsupportedScheme);
    }

    #[test]
    fn test_parse_error_malformed_message() {
        let err = ParseError::malformed("http://[::1", "invalid IPv6 address");
        let msg = err.to_string();
        assert!(msg.contains("http://[::1"));
        assert!(msg.contains("invalid IPv6"));
        assert_eq!(err.kind(), DiagnosticKind::InvalidUrl);
    }

    #[test]
    fn test_parse_error_too_long_message() {
        let long_url = "https://example.com/".to_string() + &"a".repeat(2500);
        let err = ParseError::too_long(&long_url, DEFAULT_MAX_URL_LENGTH);
        let msg = err.to_string();
        assert!(msg.contains("too long"));
        assert!(msg.contains("2048"), "should mention max length: {msg}");
        assert!(msg.contains("2520"), "should mention actual length: {msg}");
        assert_eq!(err.kind(), DiagnosticKind::UrlTooLong);
    }

    #[test]
    fn test_parse_error_too_long_preview_is_truncated() {
        let long_url = "https://example.com/".to_string() + &"b".repeat(100);
        let ParseError::UrlTooLong { url_preview, .. } = ParseError::too_long(&long_url, 10)
        else {
            panic!("expected UrlTooLong");
        };
        assert_eq!(url_preview.chars().count(), URL_PREVIEW_CHARS);
    }

    #[test]
    fn test_parse_error_empty_is_invalid_url() {
        let err = ParseError::empty("   ");
        assert!(err.to_string().contains("empty"));
        assert_eq!(err.kind(), DiagnosticKind::InvalidUrl);
    }
}
