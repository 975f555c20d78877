//! URL normalization and classification for resource references.

use tracing::trace;
use url::{ParseError as UrlParseError, Url};

use super::error::ParseError;
use super::resource::ResourceType;

/// Longest extension (without the dot) still treated as a file extension.
const MAX_EXTENSION_LEN: usize = 10;

/// Prefixes of references that never point at a downloadable resource.
const IGNORED_PREFIXES: &[&str] = &["javascript:", "mailto:", "data:", "tel:"];

/// Returns true for references that are filtered silently before normalization.
///
/// Covers `javascript:`, `mailto:`, `data:`, `tel:` (case-insensitive) and
/// in-page `#fragment` links.
#[must_use]
pub fn is_ignored_reference(raw: &str) -> bool {
    let trimmed = raw.trim_start();
    if trimmed.starts_with('#') {
        return true;
    }
    IGNORED_PREFIXES.iter().any(|prefix| {
        trimmed
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
    })
}

/// Resolves a possibly-relative reference into an absolute http(s) URL.
///
/// # Rules
///
/// - Empty/whitespace input is rejected as `InvalidUrl`
/// - Input longer than `max_length` characters is rejected as `UrlTooLong`
/// - Absolute input is used as written (after syntactic validation)
/// - Relative input is resolved against `base`; without a base it is `InvalidUrl`
/// - Only `http`/`https` are accepted, and a host is required
/// - The fragment is dropped from the canonical form
///
/// Normalization is idempotent: feeding the output back in, with any base,
/// yields the same URL.
///
/// # Errors
///
/// Returns a [`ParseError`] describing why the reference was rejected.
///
/// # Examples
///
/// ```
/// use resource_harvester::parser::normalize_url;
/// use url::Url;
///
/// let base = Url::parse("https://news.example.com/issues/42/").unwrap();
/// let url = normalize_url("../files/report.pdf", Some(&base), 2048).unwrap();
/// assert_eq!(url.as_str(), "https://news.example.com/issues/files/report.pdf");
/// ```
pub fn normalize_url(raw: &str, base: Option<&Url>, max_length: usize) -> Result<Url, ParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ParseError::empty(raw));
    }

    if trimmed.chars().count() > max_length {
        return Err(ParseError::too_long(trimmed, max_length));
    }

    let mut url = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(UrlParseError::RelativeUrlWithoutBase) => {
            let Some(base) = base else {
                return Err(ParseError::relative_without_base(trimmed));
            };
            base.join(trimmed)
                .map_err(|e| ParseError::malformed(trimmed, &e.to_string()))?
        }
        Err(e) => return Err(ParseError::malformed(trimmed, &e.to_string())),
    };

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(ParseError::unsupported_scheme(trimmed, scheme)),
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(ParseError::no_host(trimmed));
    }

    url.set_fragment(None);
    trace!(raw = %trimmed, normalized = %url, "normalized reference");
    Ok(url)
}

/// Returns the lowercase extension of the URL's last path segment, with the
/// leading dot, or an empty string.
///
/// Extensions longer than 10 characters or containing non-alphanumeric
/// characters are not treated as extensions.
#[must_use]
pub fn extension_of(url: &Url) -> String {
    let Some(last_segment) = url.path_segments().and_then(Iterator::last) else {
        return String::new();
    };
    let Some(dot_index) = last_segment.rfind('.') else {
        return String::new();
    };
    let ext = &last_segment[dot_index + 1..];
    if ext.is_empty()
        || ext.len() > MAX_EXTENSION_LEN
        || !ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return String::new();
    }
    format!(".{}", ext.to_ascii_lowercase())
}

/// Classifies a normalized URL by its path extension.
#[must_use]
pub fn infer_resource_type(url: &Url) -> ResourceType {
    ResourceType::from_extension(&extension_of(url))
}
