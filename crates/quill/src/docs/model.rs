//! Wire model of the hosted document service.
//!
//! Mirrors the subset of the Google Docs REST representation this crate
//! reads and writes. All offsets are absolute UTF-16 code-unit indices into
//! the document body; the body always starts at index 1 and always ends
//! with a newline that cannot be deleted.

use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// Named paragraph style of a level-0 heading.
pub const STYLE_TITLE: &str = "TITLE";
pub const STYLE_HEADING_1: &str = "HEADING_1";
pub const STYLE_HEADING_2: &str = "HEADING_2";
pub const STYLE_HEADING_3: &str = "HEADING_3";
pub const STYLE_NORMAL: &str = "NORMAL_TEXT";

/// Length of `text` in UTF-16 code units, the unit of every offset.
pub fn utf16_len(text: &str) -> i64 {
    text.encode_utf16().count() as i64
}

/// Lower-cased, diacritic-free form used for tolerant comparisons.
pub fn fold(text: &str) -> String {
    text.nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// Half-open `[start, end)` range of UTF-16 offsets, valid only for the
/// snapshot it was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    pub start: i64,
    pub end: i64,
}

impl Span {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> i64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

// ── Document tree ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default)]
    pub document_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: Body,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Body {
    #[serde(default)]
    pub content: Vec<StructuralElement>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StructuralElement {
    #[serde(default)]
    pub start_index: i64,
    #[serde(default)]
    pub end_index: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paragraph: Option<Paragraph>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<Table>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Paragraph {
    #[serde(default)]
    pub elements: Vec<ParagraphElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paragraph_style: Option<ParagraphStyle>,
}

impl Paragraph {
    /// Concatenated run text, including the trailing newline.
    pub fn text(&self) -> String {
        self.elements
            .iter()
            .filter_map(|e| e.text_run.as_ref())
            .map(|r| r.content.as_str())
            .collect()
    }

    pub fn named_style(&self) -> Option<&str> {
        self.paragraph_style
            .as_ref()
            .and_then(|s| s.named_style_type.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParagraphElement {
    #[serde(default)]
    pub start_index: i64,
    #[serde(default)]
    pub end_index: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_run: Option<TextRun>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextRun {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    #[serde(default)]
    pub table_rows: Vec<TableRow>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TableRow {
    #[serde(default)]
    pub table_cells: Vec<TableCell>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TableCell {
    #[serde(default)]
    pub content: Vec<StructuralElement>,
}

/// A paragraph flattened out of the tree, tables included.
#[derive(Debug, Clone, PartialEq)]
pub struct ParagraphView {
    pub start: i64,
    pub end: i64,
    pub text: String,
    pub named_style: Option<String>,
    /// Whether the paragraph sits directly in the body (not in a table).
    pub top_level: bool,
}

impl Document {
    /// Every paragraph in document order, descending into table cells.
    pub fn paragraphs(&self) -> Vec<ParagraphView> {
        let mut out = Vec::new();
        collect_paragraphs(&self.body.content, true, &mut out);
        out
    }

    /// End index of the body (one past the final newline).
    pub fn end_index(&self) -> i64 {
        self.body
            .content
            .last()
            .map(|e| e.end_index)
            .unwrap_or(1)
    }

    /// Plain text of the whole body, tables included, in document order.
    pub fn plain_text(&self) -> String {
        self.paragraphs().into_iter().map(|p| p.text).collect()
    }

    /// Absolute spans of every occurrence of `needle`, scanning left to
    /// right. Each paragraph is searched as the concatenation of its runs,
    /// so a match may span runs but never paragraphs.
    pub fn find_text(&self, needle: &str) -> Vec<Span> {
        if needle.is_empty() {
            return Vec::new();
        }
        let mut spans = Vec::new();
        self.for_each_paragraph(|start, content| {
            for (byte_pos, _) in content.match_indices(needle) {
                let offset = start + utf16_prefix_len(content, byte_pos);
                spans.push(Span::new(offset, offset + utf16_len(needle)));
            }
        });
        spans
    }

    /// Absolute spans of every match of `pattern` in paragraph text.
    pub fn find_matches(&self, pattern: &Regex) -> Vec<Span> {
        let mut spans = Vec::new();
        self.for_each_paragraph(|start, content| {
            for m in pattern.find_iter(content) {
                let offset = start + utf16_prefix_len(content, m.start());
                spans.push(Span::new(offset, offset + utf16_len(m.as_str())));
            }
        });
        spans
    }

    /// Ranges under each top-level `HEADING_1` whose text equals or contains
    /// `heading` (case and diacritics ignored). A range runs from the end of
    /// the heading paragraph to the start of the next `HEADING_1`, or to the
    /// end of the body minus the final newline.
    pub fn heading_ranges(&self, heading: &str) -> Vec<Span> {
        let wanted = fold(heading.trim());
        if wanted.is_empty() {
            return Vec::new();
        }
        let headings: Vec<ParagraphView> = self
            .paragraphs()
            .into_iter()
            .filter(|p| p.top_level && p.named_style.as_deref() == Some(STYLE_HEADING_1))
            .collect();
        let body_end = self.end_index() - 1;

        let mut spans = Vec::new();
        for (i, h) in headings.iter().enumerate() {
            let have = fold(h.text.trim());
            if have != wanted && !have.contains(&wanted) {
                continue;
            }
            let end = headings.get(i + 1).map_or(body_end, |next| next.start);
            if end > h.end {
                spans.push(Span::new(h.end, end));
            }
        }
        spans
    }

    /// Calls `f` with the start index and joined run text of every
    /// paragraph, table cells included.
    fn for_each_paragraph(&self, mut f: impl FnMut(i64, &str)) {
        fn walk(elements: &[StructuralElement], f: &mut impl FnMut(i64, &str)) {
            for element in elements {
                if let Some(paragraph) = &element.paragraph {
                    let start = paragraph
                        .elements
                        .first()
                        .map_or(element.start_index, |pe| pe.start_index);
                    f(start, &paragraph.text());
                }
                if let Some(table) = &element.table {
                    for row in &table.table_rows {
                        for cell in &row.table_cells {
                            walk(&cell.content, f);
                        }
                    }
                }
            }
        }
        walk(&self.body.content, &mut f);
    }
}

fn collect_paragraphs(
    elements: &[StructuralElement],
    top_level: bool,
    out: &mut Vec<ParagraphView>,
) {
    for element in elements {
        if let Some(paragraph) = &element.paragraph {
            out.push(ParagraphView {
                start: element.start_index,
                end: element.end_index,
                text: paragraph.text(),
                named_style: paragraph.named_style().map(str::to_string),
                top_level,
            });
        }
        if let Some(table) = &element.table {
            for row in &table.table_rows {
                for cell in &row.table_cells {
                    collect_paragraphs(&cell.content, false, out);
                }
            }
        }
    }
}

/// UTF-16 length of the first `byte_pos` bytes of `text`.
fn utf16_prefix_len(text: &str, byte_pos: usize) -> i64 {
    text.char_indices()
        .take_while(|(i, _)| *i < byte_pos)
        .map(|(_, c)| c.len_utf16() as i64)
        .sum()
}

// ── Edit requests ──────────────────────────────────────────────────

/// One operation inside a `batchUpdate`. Serializes to the externally
/// tagged camelCase shape the service expects, e.g.
/// `{"insertText": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum Request {
    InsertText(InsertTextRequest),
    DeleteContentRange(DeleteContentRangeRequest),
    UpdateTextStyle(UpdateTextStyleRequest),
    UpdateParagraphStyle(UpdateParagraphStyleRequest),
    UpdateDocumentStyle(UpdateDocumentStyleRequest),
}

impl Request {
    pub fn insert_text(index: i64, text: impl Into<String>) -> Self {
        Request::InsertText(InsertTextRequest {
            location: Location { index },
            text: text.into(),
        })
    }

    pub fn delete_range(span: Span) -> Self {
        Request::DeleteContentRange(DeleteContentRangeRequest {
            range: Range::from(span),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InsertTextRequest {
    pub location: Location,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteContentRangeRequest {
    pub range: Range,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTextStyleRequest {
    pub range: Range,
    pub text_style: TextStyle,
    pub fields: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateParagraphStyleRequest {
    pub range: Range,
    pub paragraph_style: ParagraphStyle,
    pub fields: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDocumentStyleRequest {
    pub document_style: DocumentStyle,
    pub fields: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub index: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Range {
    pub start_index: i64,
    pub end_index: i64,
}

impl From<Span> for Range {
    fn from(span: Span) -> Self {
        Self {
            start_index: span.start,
            end_index: span.end,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Dimension {
    pub magnitude: f64,
    pub unit: String,
}

impl Dimension {
    pub fn pt(magnitude: f64) -> Self {
        Self {
            magnitude,
            unit: "PT".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeightedFontFamily {
    pub font_family: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<Dimension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weighted_font_family: Option<WeightedFontFamily>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Alignment {
    Start,
    Center,
    End,
    Justified,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParagraphStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub named_style_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<Alignment>,
    /// Percentage, 100 is single spacing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_spacing: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indent_first_line: Option<Dimension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_above: Option<Dimension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_below: Option<Dimension>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin_top: Option<Dimension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin_bottom: Option<Dimension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin_left: Option<Dimension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin_right: Option<Dimension>,
}
