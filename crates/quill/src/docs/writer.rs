//! Section-level writes against a document.
//!
//! [`DocumentWriter`] is stateless apart from the document it addresses.
//! Every operation reads one snapshot, computes all offsets against it and
//! sends a single batch, deleting from the highest offset down so no
//! deletion shifts a range still waiting its turn.

use super::client::{DocumentService, delete_requests};
use super::formatter::{AcademicFormatter, inserted_units};
use super::markers::{
    AnchorPair, MARKER_PATTERN, locate_section, removal_span, repeats_title, section_text,
};
use crate::authoring::outline::Outline;
use crate::error::DocsError;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, info};

/// Sweeps before finalize gives up on markers that keep reappearing.
const MAX_FINALIZE_PASSES: usize = 8;

/// Index right after the implicit start of the body.
const BODY_START: i64 = 1;

static BULLET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*•+]\s+)+").unwrap_or_else(|e| panic!("invalid bullet pattern: {e}"))
});

static EMPHASIS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\*\*|__|\*|`").unwrap_or_else(|e| panic!("invalid emphasis pattern: {e}"))
});

/// One classified line of section content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentLine {
    SubHeading(String),
    Paragraph(String),
}

/// Split generated content into sub-headings and paragraphs.
///
/// Blank lines and lines repeating `title` are skipped; `#` lines become
/// sub-headings; bullet and emphasis markup is stripped from the rest.
pub fn classify_lines(content: &str, title: &str) -> Vec<ContentLine> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !repeats_title(line, title))
        .filter_map(|line| {
            if line.starts_with('#') {
                let text = EMPHASIS.replace_all(line.trim_start_matches('#'), "");
                let text = text.trim();
                (!text.is_empty()).then(|| ContentLine::SubHeading(text.to_string()))
            } else {
                let text = BULLET.replace(line, "");
                let text = EMPHASIS.replace_all(&text, "");
                let text = text.trim();
                (!text.is_empty()).then(|| ContentLine::Paragraph(text.to_string()))
            }
        })
        .collect()
}

/// Writes skeletons and sections into documents behind a [`DocumentService`].
pub struct DocumentWriter<'a> {
    docs: &'a dyn DocumentService,
    formatter: AcademicFormatter,
}

impl<'a> DocumentWriter<'a> {
    pub fn new(docs: &'a dyn DocumentService, formatter: AcademicFormatter) -> Self {
        Self { docs, formatter }
    }

    /// Create a document holding the title, a heading per section and an
    /// anchor pair under each heading.
    ///
    /// Everything is inserted at the start of the body. Sections go in
    /// reverse so each lands above the ones already written, which leaves
    /// them in outline order without tracking a running offset. The title
    /// goes last for the same reason.
    pub async fn create_skeleton(
        &self,
        title: &str,
        outline: &Outline,
    ) -> Result<String, DocsError> {
        let document_id = self.docs.create(title).await?;

        let mut requests = self.formatter.document_style();
        for section in outline.sections.iter().rev() {
            let pair = AnchorPair::for_key(&section.key);
            requests.extend(self.formatter.paragraph(&pair.end, BODY_START));
            requests.extend(self.formatter.paragraph("", BODY_START));
            requests.extend(self.formatter.paragraph(&pair.start, BODY_START));
            requests.extend(self.formatter.heading(section.display_title(), 1, BODY_START));
        }
        requests.extend(self.formatter.heading(title, 0, BODY_START));

        self.docs.batch_edit(&document_id, requests).await?;
        info!(
            "Created skeleton {document_id} with {} sections",
            outline.sections.len()
        );
        Ok(document_id)
    }

    /// Replace the region of section `key` with `content`.
    ///
    /// The region is found through the matcher tiers (anchors first, then
    /// legacy placeholders and heading ranges). `title_hint` is the display
    /// title used for the heading fallback and for dropping a repeated title
    /// line from `content`.
    pub async fn write_section(
        &self,
        document_id: &str,
        key: &str,
        content: &str,
        title_hint: &str,
    ) -> Result<(), DocsError> {
        let doc = self.docs.fetch(document_id).await?;
        let spans = locate_section(&doc, key, title_hint)
            .ok_or_else(|| DocsError::NotFound(format!("section {key} in {document_id}")))?;
        let insert_at = spans
            .first()
            .map(|s| s.start)
            .ok_or_else(|| DocsError::NotFound(format!("section {key} in {document_id}")))?;
        debug!("Section {key}: replacing {spans:?}, inserting at {insert_at}");

        let mut requests = delete_requests(spans);

        let title = if title_hint.trim().is_empty() { key } else { title_hint };
        let lines = classify_lines(content, title);
        let mut cursor = insert_at;
        if lines.is_empty() {
            requests.extend(self.formatter.paragraph("", cursor));
        }
        for line in &lines {
            let ops = match line {
                ContentLine::SubHeading(text) => self.formatter.heading(text, 2, cursor),
                ContentLine::Paragraph(text) => self.formatter.paragraph(text, cursor),
            };
            cursor += inserted_units(&ops);
            requests.extend(ops);
        }

        self.docs.batch_edit(document_id, requests).await?;
        info!("Wrote section {key} ({} lines) to {document_id}", lines.len());
        Ok(())
    }

    /// Plain text of section `key`, trimmed.
    pub async fn read_section(&self, document_id: &str, key: &str) -> Result<String, DocsError> {
        let doc = self.docs.fetch(document_id).await?;
        section_text(&doc.plain_text(), key)
            .ok_or_else(|| DocsError::NotFound(format!("anchor for {key} in {document_id}")))
    }

    /// Remove every marker and placeholder. Returns how many were removed.
    pub async fn finalize(&self, document_id: &str) -> Result<usize, DocsError> {
        let mut removed = 0;
        for pass in 0..MAX_FINALIZE_PASSES {
            let doc = self.docs.fetch(document_id).await?;
            let markers = doc.find_matches(&MARKER_PATTERN);
            if markers.is_empty() {
                info!("Finalized {document_id}: removed {removed} markers");
                return Ok(removed);
            }
            debug!("Finalize pass {pass}: {} markers", markers.len());
            removed += markers.len();
            let spans = markers.into_iter().map(|m| removal_span(&doc, m)).collect();
            self.docs
                .batch_edit(document_id, delete_requests(spans))
                .await?;
        }
        Err(DocsError::Api(format!(
            "markers remain in {document_id} after {MAX_FINALIZE_PASSES} passes"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authoring::outline::SectionDescriptor;
    use crate::docs::formatter::FormatStyle;
    use crate::docs::memory::InMemoryDocuments;
    use crate::docs::model::STYLE_HEADING_1;

    fn outline(titles: &[&str]) -> Outline {
        Outline::new(
            "Report",
            titles.iter().map(|t| SectionDescriptor::new(*t)).collect(),
        )
    }

    #[test]
    fn classify_strips_markup_and_title() {
        let lines = classify_lines(
            "## Introdução\n\n- **First** point\n### Background\n`code` and *emphasis*\n",
            "Introdução",
        );
        assert_eq!(
            lines,
            vec![
                ContentLine::Paragraph("First point".into()),
                ContentLine::SubHeading("Background".into()),
                ContentLine::Paragraph("code and emphasis".into()),
            ]
        );
    }

    #[tokio::test]
    async fn skeleton_is_in_outline_order() {
        let docs = InMemoryDocuments::new();
        let writer = DocumentWriter::new(&docs, AcademicFormatter::new(FormatStyle::Abnt));
        let id = writer
            .create_skeleton("Report", &outline(&["Intro", "Methods"]))
            .await
            .unwrap();
        assert_eq!(
            docs.text(&id).unwrap(),
            "Report\nINTRO\n[[START:INTRO]]\n\n[[END:INTRO]]\n\
             METHODS\n[[START:METHODS]]\n\n[[END:METHODS]]\n\n"
        );
        assert_eq!(docs.batch_count(), 1);
    }

    #[tokio::test]
    async fn write_then_read_section() {
        let docs = InMemoryDocuments::new();
        let writer = DocumentWriter::new(&docs, AcademicFormatter::default());
        let id = writer
            .create_skeleton("Report", &outline(&["Intro", "Methods"]))
            .await
            .unwrap();
        let content = "# Methods\nWe measured.\n## Sampling\nAt noon.";
        writer
            .write_section(&id, "METHODS", content, "Methods")
            .await
            .unwrap();
        assert_eq!(
            writer.read_section(&id, "METHODS").await.unwrap(),
            "We measured.\nSampling\nAt noon."
        );
        assert_eq!(writer.read_section(&id, "INTRO").await.unwrap(), "");
    }

    #[tokio::test]
    async fn read_missing_anchor_is_not_found() {
        let docs = InMemoryDocuments::new();
        let writer = DocumentWriter::new(&docs, AcademicFormatter::default());
        let id = writer.create_skeleton("R", &outline(&["A"])).await.unwrap();
        assert!(matches!(
            writer.read_section(&id, "B").await,
            Err(DocsError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn write_falls_back_to_heading_range() {
        let docs = InMemoryDocuments::new();
        let formatter = AcademicFormatter::default();
        let id = docs.create("Legacy").await.unwrap();
        let mut requests = formatter.paragraph("old body", 1);
        requests.extend(formatter.heading("Resultados", 1, 1));
        docs.batch_edit(&id, requests).await.unwrap();

        let writer = DocumentWriter::new(&docs, formatter);
        writer
            .write_section(&id, "RESULTADOS", "New body.", "resultados")
            .await
            .unwrap();
        let doc = docs.fetch(&id).await.unwrap();
        assert_eq!(doc.plain_text(), "RESULTADOS\nNew body.\n\n");
        assert_eq!(
            doc.paragraphs()[0].named_style.as_deref(),
            Some(STYLE_HEADING_1)
        );
    }

    #[tokio::test]
    async fn write_without_any_match_is_not_found() {
        let docs = InMemoryDocuments::new();
        let writer = DocumentWriter::new(&docs, AcademicFormatter::default());
        let id = writer.create_skeleton("R", &outline(&["A"])).await.unwrap();
        let err = writer
            .write_section(&id, "ZZZ", "text", "Nothing like it")
            .await
            .unwrap_err();
        assert!(matches!(err, DocsError::NotFound(_)));
    }

    #[tokio::test]
    async fn finalize_removes_every_marker_format() {
        let docs = InMemoryDocuments::new();
        let formatter = AcademicFormatter::default();
        let writer = DocumentWriter::new(&docs, formatter);
        let id = writer
            .create_skeleton("Report", &outline(&["Intro"]))
            .await
            .unwrap();
        writer
            .write_section(&id, "INTRO", "Body text.", "Intro")
            .await
            .unwrap();
        docs.batch_edit(&id, formatter.paragraph("see {{#OLD#}} and {{*OLDER*}}", 1))
            .await
            .unwrap();

        let removed = writer.finalize(&id).await.unwrap();
        assert_eq!(removed, 4);
        assert_eq!(
            docs.text(&id).unwrap(),
            "see  and \nReport\nINTRO\nBody text.\n\n"
        );
    }
}
