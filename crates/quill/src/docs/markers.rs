//! Marker protocol and range discovery.
//!
//! Every section of a skeleton document is bracketed by an anchor pair:
//!
//! ```text
//! INTRODUCTION
//! [[START:INTRODUCTION]]
//! ...section content...
//! [[END:INTRODUCTION]]
//! ```
//!
//! Documents migrated from earlier tooling may carry `{{#KEY#}}` or
//! `{{*KEY*}}` placeholders instead, or nothing but the section heading.
//! [`MATCHER_TIERS`] lists the strategies in priority order; the first tier
//! that yields any span wins and its spans are merged with
//! [`merge_ranges`] before anything is deleted.

use super::model::{Document, STYLE_HEADING_1, Span, fold, utf16_len};
use regex::Regex;
use std::sync::LazyLock;

/// Every marker and placeholder syntax, for the finalize sweep.
pub static MARKER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[(?:START|END):[^\]\n]+\]\]|\{\{#[^#}\n]+#\}\}|\{\{\*[^*}\n]+\*\}\}")
        .unwrap_or_else(|e| panic!("invalid marker pattern: {e}"))
});

/// Start and end marker text for one section key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorPair {
    pub start: String,
    pub end: String,
}

impl AnchorPair {
    pub fn for_key(key: &str) -> Self {
        Self {
            start: format!("[[START:{key}]]"),
            end: format!("[[END:{key}]]"),
        }
    }
}

/// Placeholder syntaxes written by earlier versions of the skeleton.
pub fn legacy_placeholders(key: &str) -> [String; 2] {
    [format!("{{{{#{key}#}}}}"), format!("{{{{*{key}*}}}}")]
}

/// One way of locating a section's region in a document snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    /// Between the start marker's paragraph and the end marker.
    AnchorPair,
    /// The placeholder text itself.
    LegacyPlaceholder,
    /// Under the `HEADING_1` whose text matches the section title.
    HeadingTitle,
}

/// Matchers grouped by priority. Within a tier all hits are collected.
pub const MATCHER_TIERS: &[&[Matcher]] = &[
    &[Matcher::AnchorPair],
    &[Matcher::LegacyPlaceholder, Matcher::HeadingTitle],
];

impl Matcher {
    pub fn locate(self, doc: &Document, key: &str, title: &str) -> Vec<Span> {
        match self {
            Matcher::AnchorPair => anchor_regions(doc, key),
            Matcher::LegacyPlaceholder => legacy_placeholders(key)
                .iter()
                .flat_map(|p| doc.find_text(p))
                .collect(),
            Matcher::HeadingTitle => {
                let heading = if title.trim().is_empty() { key } else { title };
                doc.heading_ranges(heading)
            }
        }
    }
}

/// Merged spans for a section from the first tier with any hit, or `None`
/// if no tier matches.
pub fn locate_section(doc: &Document, key: &str, title: &str) -> Option<Vec<Span>> {
    MATCHER_TIERS.iter().find_map(|tier| {
        let spans: Vec<Span> = tier
            .iter()
            .flat_map(|m| m.locate(doc, key, title))
            .collect();
        (!spans.is_empty()).then(|| merge_ranges(spans))
    })
}

/// Regions bracketed by the anchor pair for `key`.
///
/// A region starts at the paragraph after the start marker and ends where
/// the next end marker begins. Without an end marker it runs to the next
/// `HEADING_1` or to the end of the body minus the final newline.
fn anchor_regions(doc: &Document, key: &str) -> Vec<Span> {
    let pair = AnchorPair::for_key(key);
    let starts = doc.find_text(&pair.start);
    if starts.is_empty() {
        return Vec::new();
    }
    let ends = doc.find_text(&pair.end);
    let paragraphs = doc.paragraphs();
    let body_end = doc.end_index() - 1;

    starts
        .iter()
        .map(|marker| {
            let region_start = paragraphs
                .iter()
                .find(|p| p.start <= marker.start && marker.start < p.end)
                .map_or(marker.end, |p| p.end);
            let region_end = ends
                .iter()
                .find(|e| e.start >= region_start)
                .map(|e| e.start)
                .or_else(|| {
                    paragraphs
                        .iter()
                        .find(|p| {
                            p.top_level
                                && p.start >= region_start
                                && p.named_style.as_deref() == Some(STYLE_HEADING_1)
                        })
                        .map(|p| p.start)
                })
                .unwrap_or(body_end);
            Span::new(region_start, region_end.max(region_start))
        })
        .collect()
}

/// Sort spans and merge the ones that overlap or touch.
pub fn merge_ranges(mut spans: Vec<Span>) -> Vec<Span> {
    spans.sort();
    let mut merged: Vec<Span> = Vec::with_capacity(spans.len());
    for span in spans {
        match merged.last_mut() {
            Some(last) if span.start <= last.end => last.end = last.end.max(span.end),
            _ => merged.push(span),
        }
    }
    merged
}

/// What to delete for a marker found at `marker`.
///
/// A marker alone on its paragraph takes the whole paragraph with it. When
/// that paragraph is the last one, the preceding newline goes instead of
/// its own, which the service will not delete.
pub fn removal_span(doc: &Document, marker: Span) -> Span {
    let paragraphs = doc.paragraphs();
    let Some(pos) = paragraphs
        .iter()
        .position(|p| p.start <= marker.start && marker.end <= p.end)
    else {
        return marker;
    };
    let paragraph = &paragraphs[pos];
    if utf16_len(paragraph.text.trim()) != marker.len() || !paragraph.top_level {
        return marker;
    }
    if pos + 1 < paragraphs.len() {
        Span::new(paragraph.start, paragraph.end)
    } else if paragraph.start > 1 {
        Span::new(paragraph.start - 1, paragraph.end - 1)
    } else {
        marker
    }
}

/// Text between the start marker for `key` and its end marker (or the end
/// of `text`), trimmed. `None` when the start marker is absent.
pub fn section_text(text: &str, key: &str) -> Option<String> {
    let pair = AnchorPair::for_key(key);
    let (_, rest) = text.split_once(&pair.start)?;
    let body = rest
        .split_once(&pair.end)
        .map_or(rest, |(inside, _)| inside);
    Some(body.trim().to_string())
}

/// Whether `line` repeats `title`, ignoring case, diacritics, markdown
/// hashes and emphasis.
pub fn repeats_title(line: &str, title: &str) -> bool {
    let clean = |s: &str| {
        fold(
            s.trim()
                .trim_start_matches('#')
                .replace(['*', '_', '`'], "")
                .trim(),
        )
    };
    let title = clean(title);
    !title.is_empty() && clean(line) == title
}
