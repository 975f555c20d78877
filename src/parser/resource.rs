//! Types describing resources and diagnostics produced by the parser.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Coarse classification of a resource, inferred from its URL extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResourceType {
    /// Portable Document Format.
    Pdf,
    /// Raster or vector image.
    Image,
    /// Office documents, spreadsheets, presentations and plain text.
    Document,
    /// No extension, or one not in the extension table.
    Unknown,
}

impl ResourceType {
    /// Maps a lowercase extension (with or without the leading dot) to a type.
    ///
    /// Unrecognized or empty extensions map to [`ResourceType::Unknown`].
    ///
    /// ```
    /// use resource_harvester::parser::ResourceType;
    ///
    /// assert_eq!(ResourceType::from_extension(".pdf"), ResourceType::Pdf);
    /// assert_eq!(ResourceType::from_extension("PNG"), ResourceType::Image);
    /// assert_eq!(ResourceType::from_extension(""), ResourceType::Unknown);
    /// ```
    #[must_use]
    pub fn from_extension(extension: &str) -> Self {
        let ext = extension.trim_start_matches('.').to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Self::Pdf,
            "jpg" | "jpeg" | "png" | "gif" | "webp" | "svg" | "bmp" | "tif" | "tiff" => {
                Self::Image
            }
            "doc" | "docx" | "xls" | "xlsx" | "ppt" | "pptx" | "odt" | "ods" | "odp" | "rtf"
            | "txt" | "csv" => Self::Document,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pdf => write!(f, "PDF"),
            Self::Image => write!(f, "IMAGE"),
            Self::Document => write!(f, "DOCUMENT"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Where in the markup a reference was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceOrigin {
    /// Element name (`a`, `img`, `style`, ...).
    pub tag: String,
    /// Attribute name, or `#text` for `<style>` block contents.
    pub attribute: String,
    /// Serialized source snippet, truncated.
    pub snippet: String,
}

/// Optional human-readable hints attached to a resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceContext {
    /// `alt` attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    /// `title` attribute, or anchor text for links without one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// `aria-label` attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aria_label: Option<String>,
}

impl ResourceContext {
    /// Returns true when no hint is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.alt.is_none() && self.title.is_none() && self.aria_label.is_none()
    }
}

/// One resource reference discovered in an HTML document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedResource {
    /// The reference exactly as written in markup.
    pub source_url: String,
    /// Absolute, canonical URL. Unique within one parse result.
    pub normalized_url: String,
    /// Type inferred from the extension.
    pub resource_type: ResourceType,
    /// Lowercase extension including the leading dot, or empty.
    pub extension: String,
    /// Element/attribute that produced this reference.
    pub origin: ResourceOrigin,
    /// Hints from the first occurrence.
    #[serde(skip_serializing_if = "ResourceContext::is_empty", default)]
    pub context: ResourceContext,
    /// Whether the host differs from the document's base host.
    pub is_external: bool,
    /// Ordinal of the first occurrence among all scanned references.
    pub position: usize,
}

/// Kind tag for a [`ParseDiagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Attribute was empty or whitespace only.
    EmptyUrl,
    /// Malformed, hostless, or relative without a base.
    InvalidUrl,
    /// Longer than the configured maximum.
    UrlTooLong,
    /// Scheme other than http/https.
    UnsupportedScheme,
    /// Repeat of an already collected normalized URL.
    Duplicate,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::EmptyUrl => "empty_url",
            Self::InvalidUrl => "invalid_url",
            Self::UrlTooLong => "url_too_long",
            Self::UnsupportedScheme => "unsupported_scheme",
            Self::Duplicate => "duplicate",
        };
        f.write_str(label)
    }
}

/// A non-fatal issue encountered while parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseDiagnostic {
    /// Kind tag.
    pub kind: DiagnosticKind,
    /// Human-readable message.
    pub message: String,
    /// Offending source snippet.
    pub snippet: String,
}

impl ParseDiagnostic {
    /// Creates a new diagnostic.
    #[must_use]
    pub fn new(kind: DiagnosticKind, message: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            snippet: snippet.into(),
        }
    }
}

impl fmt::Display for ParseDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}
