//! Resource extraction from newsletter HTML.
//!
//! This module walks an HTML document, finds references to downloadable
//! resources (PDFs, office documents, images), normalizes them into absolute
//! URLs and deduplicates them.
//!
//! # Scanned locations
//!
//! - `a[href]`, `img[src]`, `img[srcset]`, `embed[src]`, `object[data]`,
//!   `source[src]`, `source[srcset]`
//! - `background`/`background-image` `url(...)` values in inline `style`
//!   attributes and `<style>` blocks (when `include_backgrounds` is set)
//!
//! # Example
//!
//! ```
//! use resource_harvester::parser::{ParseOptions, ResourceType, parse_resources};
//!
//! let html = r#"<a href="/files/report.pdf">Report</a><img src="https://cdn.example.org/chart.png">"#;
//! let options = ParseOptions::default()
//!     .with_base_url("https://news.example.com/issue/1")
//!     .unwrap()
//!     .with_external_only(false);
//!
//! let result = parse_resources(html, &options);
//! assert_eq!(result.resources.len(), 2);
//! assert_eq!(result.resources[0].resource_type, ResourceType::Pdf);
//! assert!(!result.resources[0].is_external);
//! assert!(result.resources[1].is_external);
//! ```

mod error;
mod html;
mod resource;
mod url;

pub use error::{DEFAULT_MAX_URL_LENGTH, ParseError};
pub use resource::{
    DiagnosticKind, ParseDiagnostic, ParsedResource, ResourceContext, ResourceOrigin,
    ResourceType,
};
pub use self::url::{extension_of, infer_resource_type, is_ignored_reference, normalize_url};

use std::collections::HashMap;
use std::time::{Duration, Instant};

use ::url::Url;
use scraper::Html;
use serde::Serialize;
use tracing::{debug, info};

/// Options controlling [`parse_resources`].
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Base URL for resolving relative references and deciding externality.
    pub base_url: Option<Url>,
    /// Drop resources hosted on the base URL's host.
    pub external_only: bool,
    /// Also scan CSS `background-image` references.
    pub include_backgrounds: bool,
    /// References longer than this are rejected as diagnostics.
    pub max_url_length: usize,
    /// Keep only these types when set.
    pub allowed_types: Option<Vec<ResourceType>>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            base_url: None,
            external_only: true,
            include_backgrounds: true,
            max_url_length: DEFAULT_MAX_URL_LENGTH,
            allowed_types: None,
        }
    }
}

impl ParseOptions {
    /// Sets the base URL from a string.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if the base is not an absolute http(s) URL.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, ParseError> {
        self.base_url = Some(normalize_url(base_url, None, usize::MAX)?);
        Ok(self)
    }

    /// Sets whether same-host resources are dropped.
    #[must_use]
    pub fn with_external_only(mut self, external_only: bool) -> Self {
        self.external_only = external_only;
        self
    }

    /// Sets whether CSS background images are scanned.
    #[must_use]
    pub fn with_backgrounds(mut self, include_backgrounds: bool) -> Self {
        self.include_backgrounds = include_backgrounds;
        self
    }

    /// Sets the maximum accepted URL length.
    #[must_use]
    pub fn with_max_url_length(mut self, max_url_length: usize) -> Self {
        self.max_url_length = max_url_length;
        self
    }

    /// Restricts results to the given resource types.
    #[must_use]
    pub fn with_allowed_types(mut self, types: Vec<ResourceType>) -> Self {
        self.allowed_types = Some(types);
        self
    }

    fn base_host(&self) -> Option<&str> {
        self.base_url.as_ref().and_then(Url::host_str)
    }

    fn allows(&self, resource_type: ResourceType) -> bool {
        self.allowed_types
            .as_ref()
            .is_none_or(|types| types.contains(&resource_type))
    }
}

/// Per-type resource counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TypeCounts {
    /// PDF resources.
    pub pdf: usize,
    /// Image resources.
    pub image: usize,
    /// Document resources.
    pub document: usize,
    /// Unclassified resources.
    pub unknown: usize,
}

impl TypeCounts {
    fn record(&mut self, resource_type: ResourceType) {
        match resource_type {
            ResourceType::Pdf => self.pdf += 1,
            ResourceType::Image => self.image += 1,
            ResourceType::Document => self.document += 1,
            ResourceType::Unknown => self.unknown += 1,
        }
    }

    /// Returns the count for one type.
    #[must_use]
    pub fn get(&self, resource_type: ResourceType) -> usize {
        match resource_type {
            ResourceType::Pdf => self.pdf,
            ResourceType::Image => self.image,
            ResourceType::Document => self.document,
            ResourceType::Unknown => self.unknown,
        }
    }
}

/// Aggregate statistics for one parse.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParseSummary {
    /// Resources in the result.
    pub total_resources: usize,
    /// Resources whose host differs from the base host.
    pub external_resources: usize,
    /// Breakdown by type.
    pub by_type: TypeCounts,
    /// Repeated references collapsed into an earlier resource.
    pub duplicates: usize,
    /// References dropped by the same-host or type filters.
    pub filtered: usize,
    /// Diagnostics recorded (duplicates included).
    pub diagnostics: usize,
    /// Wall time spent parsing.
    pub parse_duration: Duration,
    /// Input length in bytes.
    pub html_length: usize,
}

/// Output of [`parse_resources`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParseResult {
    /// Unique resources in order of first occurrence.
    pub resources: Vec<ParsedResource>,
    /// Non-fatal issues.
    pub diagnostics: Vec<ParseDiagnostic>,
    /// Statistics.
    pub summary: ParseSummary,
}

impl ParseResult {
    /// Returns true if no resources were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Returns the number of resources found.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns an iterator over resources of one type.
    pub fn of_type(&self, resource_type: ResourceType) -> impl Iterator<Item = &ParsedResource> {
        self.resources
            .iter()
            .filter(move |r| r.resource_type == resource_type)
    }
}

/// Extracts a deduplicated, normalized resource list from HTML.
///
/// Pure and synchronous. Never fails: malformed markup is recovered by the
/// HTML parser, and bad references become [`ParseDiagnostic`]s.
#[tracing::instrument(skip(html, options), fields(html_len = html.len(), base = ?options.base_url.as_ref().map(Url::as_str)))]
#[must_use]
pub fn parse_resources(html: &str, options: &ParseOptions) -> ParseResult {
    let started = Instant::now();
    let mut result = ParseResult::default();

    if html.trim().is_empty() {
        debug!("empty HTML input");
        result.summary.parse_duration = started.elapsed();
        return result;
    }

    let document = Html::parse_document(html);
    let candidates = html::collect_candidates(&document, options.include_backgrounds);
    let base = options.base_url.as_ref();
    let base_host = options.base_host();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for (position, candidate) in candidates.into_iter().enumerate() {
        if is_ignored_reference(&candidate.raw) {
            continue;
        }

        if candidate.raw.trim().is_empty() {
            result.diagnostics.push(ParseDiagnostic::new(
                DiagnosticKind::EmptyUrl,
                format!(
                    "empty {} attribute on <{}>",
                    candidate.origin.attribute, candidate.origin.tag
                ),
                candidate.origin.snippet,
            ));
            continue;
        }

        let url = match normalize_url(&candidate.raw, base, options.max_url_length) {
            Ok(url) => url,
            Err(e) => {
                debug!(raw = %candidate.raw, error = %e, "skipping reference");
                result.diagnostics.push(ParseDiagnostic::new(
                    e.kind(),
                    e.to_string(),
                    candidate.origin.snippet,
                ));
                continue;
            }
        };

        let is_external = base_host.is_none_or(|host| url.host_str() != Some(host));
        let extension = extension_of(&url);
        let resource_type = ResourceType::from_extension(&extension);

        if (options.external_only && !is_external) || !options.allows(resource_type) {
            result.summary.filtered += 1;
            continue;
        }

        let normalized_url = url.to_string();
        if let Some(&first_position) = seen.get(&normalized_url) {
            result.summary.duplicates += 1;
            result.diagnostics.push(ParseDiagnostic::new(
                DiagnosticKind::Duplicate,
                format!("duplicate of resource at position {first_position}: {normalized_url}"),
                candidate.origin.snippet,
            ));
            continue;
        }
        seen.insert(normalized_url.clone(), position);

        result.resources.push(ParsedResource {
            source_url: candidate.raw,
            normalized_url,
            resource_type,
            extension,
            origin: candidate.origin,
            context: candidate.context,
            is_external,
            position,
        });
    }

    let summary = &mut result.summary;
    for resource in &result.resources {
        summary.by_type.record(resource.resource_type);
        if resource.is_external {
            summary.external_resources += 1;
        }
    }
    summary.total_resources = result.resources.len();
    summary.diagnostics = result.diagnostics.len();
    summary.html_length = html.len();
    summary.parse_duration = started.elapsed();

    info!(
        resources = summary.total_resources,
        external = summary.external_resources,
        duplicates = summary.duplicates,
        diagnostics = summary.diagnostics,
        "parsed HTML resources"
    );

    result
}
