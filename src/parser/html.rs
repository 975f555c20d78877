//! Candidate discovery over an HTML element tree.
//!
//! Walks the document in tree order and yields every raw reference found in
//! the known element/attribute pairs. No validation happens here; the caller
//! filters, normalizes and deduplicates.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::resource::{ResourceContext, ResourceOrigin};

/// Maximum characters kept in an origin snippet.
const SNIPPET_MAX_CHARS: usize = 200;

/// Maximum characters of anchor text used as a title hint.
const LINK_TEXT_MAX_CHARS: usize = 200;

/// Elements that may carry resource references, plus anything with inline style.
#[allow(clippy::expect_used)]
static CANDIDATE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("a[href], img, embed[src], object[data], source, style, [style]")
        .expect("candidate selector is valid") // Static pattern, safe to panic
});

/// Matches a `background` or `background-image` declaration value.
#[allow(clippy::expect_used)]
static BACKGROUND_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)background(?:-image)?\s*:([^;}]*)").expect("background regex is valid")
});

/// Matches one `url(...)` token, quoted or not.
#[allow(clippy::expect_used)]
static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)url\(\s*['"]?([^'")]*?)['"]?\s*\)"#).expect("css url regex is valid")
});

/// A raw reference found in markup, before normalization.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    /// Reference as written.
    pub raw: String,
    /// Where it came from.
    pub origin: ResourceOrigin,
    /// Hints from the element.
    pub context: ResourceContext,
}

/// Collects reference candidates from a parsed document in document order.
pub(crate) fn collect_candidates(document: &Html, include_backgrounds: bool) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    for element in document.select(&CANDIDATE_SELECTOR) {
        let tag = element.value().name();
        match tag {
            "a" => push_attr(&mut candidates, element, "href"),
            "img" | "source" => {
                push_attr(&mut candidates, element, "src");
                push_srcset(&mut candidates, element);
            }
            "embed" => push_attr(&mut candidates, element, "src"),
            "object" => push_attr(&mut candidates, element, "data"),
            "style" if include_backgrounds => {
                let css: String = element.text().collect();
                push_css_urls(&mut candidates, element, "#text", &css);
            }
            _ => {}
        }

        if include_backgrounds && let Some(style) = element.value().attr("style") {
            push_css_urls(&mut candidates, element, "style", style);
        }
    }

    candidates
}

fn push_attr(candidates: &mut Vec<Candidate>, element: ElementRef<'_>, attribute: &str) {
    let Some(value) = element.value().attr(attribute) else {
        return;
    };
    candidates.push(Candidate {
        raw: value.to_string(),
        origin: origin_for(element, attribute, snippet_of(element)),
        context: context_for(element),
    });
}

fn push_srcset(candidates: &mut Vec<Candidate>, element: ElementRef<'_>) {
    let Some(srcset) = element.value().attr("srcset") else {
        return;
    };
    let snippet = snippet_of(element);
    let context = context_for(element);
    let urls = split_srcset(srcset);
    if urls.is_empty() {
        // Keep the empty attribute visible to the caller as a diagnostic.
        candidates.push(Candidate {
            raw: srcset.to_string(),
            origin: origin_for(element, "srcset", snippet),
            context,
        });
        return;
    }
    for url in urls {
        candidates.push(Candidate {
            raw: url.to_string(),
            origin: origin_for(element, "srcset", snippet.clone()),
            context: context.clone(),
        });
    }
}

fn push_css_urls(
    candidates: &mut Vec<Candidate>,
    element: ElementRef<'_>,
    attribute: &str,
    css: &str,
) {
    for url in background_urls(css) {
        candidates.push(Candidate {
            raw: url.to_string(),
            origin: origin_for(element, attribute, truncate_chars(css.trim(), SNIPPET_MAX_CHARS)),
            context: context_for(element),
        });
    }
}

/// Extracts every `url(...)` inside `background`/`background-image` declarations.
pub(crate) fn background_urls(css: &str) -> Vec<&str> {
    BACKGROUND_DECLARATION
        .captures_iter(css)
        .filter_map(|caps| caps.get(1))
        .flat_map(|value| CSS_URL.captures_iter(value.as_str()))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}

/// Splits a `srcset` value into its candidate URLs, dropping descriptors.
///
/// A URL runs until whitespace; trailing commas end the candidate early.
pub(crate) fn split_srcset(value: &str) -> Vec<&str> {
    let mut urls = Vec::new();
    let mut rest = value;

    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        if rest.is_empty() {
            break;
        }
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let token = &rest[..end];
        let url = token.trim_end_matches(',');
        if !url.is_empty() {
            urls.push(url);
        }
        rest = &rest[end..];
        if token.ends_with(',') {
            continue;
        }
        // Skip descriptors ("2x", "480w") up to the next candidate.
        match rest.find(',') {
            Some(comma) => rest = &rest[comma + 1..],
            None => break,
        }
    }

    urls
}

fn origin_for(element: ElementRef<'_>, attribute: &str, snippet: String) -> ResourceOrigin {
    ResourceOrigin {
        tag: element.value().name().to_string(),
        attribute: attribute.to_string(),
        snippet,
    }
}

fn context_for(element: ElementRef<'_>) -> ResourceContext {
    let attr = |name: &str| {
        element
            .value()
            .attr(name)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(ToString::to_string)
    };

    let mut context = ResourceContext {
        alt: attr("alt"),
        title: attr("title"),
        aria_label: attr("aria-label"),
    };

    if context.title.is_none() && element.value().name() == "a" {
        let text = element.text().collect::<Vec<_>>().join(" ");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !text.is_empty() {
            context.title = Some(truncate_chars(&text, LINK_TEXT_MAX_CHARS));
        }
    }

    context
}

fn snippet_of(element: ElementRef<'_>) -> String {
    truncate_chars(&element.html(), SNIPPET_MAX_CHARS)
}

fn truncate_chars(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &value[..idx]),
        None => value.to_string(),
    }
}
