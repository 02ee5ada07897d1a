//! Outline extraction from a free-form structure proposal.
//!
//! The model is asked first to restate the proposal as outline JSON. When
//! that fails (call error, invalid JSON, schema violation, no usable
//! section) a deterministic line scan takes over. `None` means no structure
//! was detected, which callers treat as a soft outcome.

use super::outline::{Outline, SectionDescriptor, section_key};
use super::prompts;
use crate::generation::{GenerationRequest, Purpose, TextGenerator};
use crate::json_schema_for;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Longest line the fallback scan will consider a section title.
const MAX_TITLE_LINE_CHARS: usize = 100;

static HEADING_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*#{1,4}\s+(.+)$").unwrap_or_else(|e| panic!("invalid heading pattern: {e}"))
});

static NUMBERED_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\d+(?:\.\d+)*[.)]?\s+(.+)$")
        .unwrap_or_else(|e| panic!("invalid numbered pattern: {e}"))
});

static LEADING_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+(?:\.\d+)*[.)]?\s+").unwrap_or_else(|e| panic!("invalid number pattern: {e}"))
});

static EMPHASIS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\*\*|__|\*|`").unwrap_or_else(|e| panic!("invalid emphasis pattern: {e}"))
});

/// Turns proposals into outlines.
pub struct StructureExtractor<'a> {
    generator: &'a dyn TextGenerator,
    default_title: &'a str,
}

impl<'a> StructureExtractor<'a> {
    pub fn new(generator: &'a dyn TextGenerator, default_title: &'a str) -> Self {
        Self {
            generator,
            default_title,
        }
    }

    /// Outline from `proposal`, model first, line scan second.
    pub async fn extract(&self, proposal: &str) -> Option<Outline> {
        if let Some(outline) = self.extract_with_model(proposal).await {
            debug!("Outline extracted by model: {} sections", outline.sections.len());
            return Some(outline);
        }
        let outline = extract_fallback(proposal, self.default_title);
        if let Some(ref o) = outline {
            debug!("Outline extracted by line scan: {} sections", o.sections.len());
        }
        outline
    }

    async fn extract_with_model(&self, proposal: &str) -> Option<Outline> {
        let request = GenerationRequest::new(
            Purpose::ExtractOutline,
            prompts::EXTRACT_OUTLINE_SYSTEM,
            proposal,
        )
        .json();
        let text = match self.generator.generate(request, &|_| {}).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Outline extraction call failed: {e}");
                return None;
            }
        };
        match parse_outline_json(&text) {
            Ok(mut outline) => {
                if outline.title.trim().is_empty() {
                    outline.title = self.default_title.to_string();
                }
                Some(outline)
            }
            Err(e) => {
                debug!("Model outline rejected: {e}");
                None
            }
        }
    }
}

/// Parse model output as an outline.
///
/// Accepts a bare object or one wrapped in a code fence or prose. The value
/// is validated against the [`Outline`] schema before deserializing, then
/// sanitized; an outline with no usable section is an error.
pub fn parse_outline_json(text: &str) -> Result<Outline, String> {
    let start = text.find('{').ok_or("no JSON object in output")?;
    let end = text.rfind('}').ok_or("no JSON object in output")?;
    let json = text
        .get(start..=end)
        .ok_or("no JSON object in output")?;
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| format!("invalid JSON: {e}"))?;

    let schema = json_schema_for::<Outline>();
    if let Ok(validator) = jsonschema::validator_for(&schema) {
        let errors: Vec<String> = validator
            .iter_errors(&value)
            .map(|e| format!("{}: {e}", e.instance_path()))
            .collect();
        if !errors.is_empty() {
            return Err(format!("schema violations: {}", errors.join("; ")));
        }
    }

    let outline: Outline =
        serde_json::from_value(value).map_err(|e| format!("not an outline: {e}"))?;
    outline
        .sanitized()
        .ok_or_else(|| "outline has no usable sections".to_string())
}

/// Deterministic scan for markdown headings and numbered lines.
///
/// A title is the text up to the first `:` or `|`, with emphasis and any
/// leading numbering removed. Keys keep their first occurrence.
pub fn extract_fallback(proposal: &str, default_title: &str) -> Option<Outline> {
    let mut seen = HashSet::new();
    let mut sections = Vec::new();

    for line in proposal.lines() {
        if line.trim().chars().count() > MAX_TITLE_LINE_CHARS {
            continue;
        }
        let Some(caps) = HEADING_LINE
            .captures(line)
            .or_else(|| NUMBERED_LINE.captures(line))
        else {
            continue;
        };
        let Some(raw) = caps.get(1) else { continue };
        let title = clean_title(raw.as_str());
        if title.is_empty() {
            continue;
        }
        let key = section_key(&title);
        if seen.insert(key.clone()) {
            sections.push(SectionDescriptor { key, title });
        }
    }

    (!sections.is_empty()).then(|| Outline::new(default_title, sections))
}

fn clean_title(raw: &str) -> String {
    let head = raw.split([':', '|']).next().unwrap_or_default();
    let head = EMPHASIS.replace_all(head, "");
    let head = LEADING_NUMBER.replace(head.trim(), "");
    head.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::GenerateFuture;

    struct Canned(Result<String, String>);

    impl TextGenerator for Canned {
        fn generate<'a>(
            &'a self,
            _request: GenerationRequest<'a>,
            _on_delta: &'a (dyn Fn(&str) + Send + Sync),
        ) -> GenerateFuture<'a> {
            let out = self.0.clone();
            Box::pin(async move { out })
        }
    }

    fn keys(outline: &Outline) -> Vec<&str> {
        outline.keys().collect()
    }

    #[test]
    fn fallback_reads_markdown_headings() {
        let outline =
            extract_fallback("### Introdução\n### Metodologia\n### Conclusão", "Doc").unwrap();
        assert_eq!(keys(&outline), vec!["INTRODUÇÃO", "METODOLOGIA", "CONCLUSÃO"]);
        assert_eq!(outline.title, "Doc");
    }

    #[test]
    fn fallback_reads_numbered_lines_and_drops_after_colon() {
        let outline = extract_fallback(
            "1. Introdução\n2. Metodologia: detalhes\n3. Conclusão",
            "Doc",
        )
        .unwrap();
        let titles: Vec<_> = outline.sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Introdução", "Metodologia", "Conclusão"]);
    }

    #[test]
    fn fallback_strips_emphasis_numbering_and_pipes() {
        let outline = extract_fallback(
            "Here is the plan:\n## **1. Estado da arte** | revisão\n## 2) Resultados\n- not a section",
            "Doc",
        )
        .unwrap();
        assert_eq!(keys(&outline), vec!["ESTADO_DA_ARTE", "RESULTADOS"]);
    }

    #[test]
    fn fallback_keeps_first_duplicate_and_skips_long_lines() {
        let long = format!("## {}", "x".repeat(120));
        let text = format!("## Intro\n{long}\n1. Intro\n2. Body");
        let outline = extract_fallback(&text, "Doc").unwrap();
        assert_eq!(keys(&outline), vec!["INTRO", "BODY"]);
    }

    #[test]
    fn fallback_without_structure_is_none() {
        assert!(extract_fallback("Just a paragraph of prose.", "Doc").is_none());
    }

    #[test]
    fn json_with_fence_and_aliases() {
        let text = "```json\n{\"titulo\": \"Relatório\", \"secoes\": [\
                    {\"key\": \"intro\", \"title\": \"Introdução\"},\
                    {\"key\": \"\", \"title\": \"dropped\"}]}\n```";
        let outline = parse_outline_json(text).unwrap();
        assert_eq!(outline.title, "Relatório");
        assert_eq!(keys(&outline), vec!["INTRO"]);
    }

    #[test]
    fn json_schema_violation_is_rejected() {
        let err = parse_outline_json(r#"{"title": "T", "sections": "nope"}"#).unwrap_err();
        assert!(err.contains("schema"), "{err}");
    }

    #[test]
    fn json_without_sections_is_rejected() {
        assert!(parse_outline_json(r#"{"title": "T", "sections": []}"#).is_err());
        assert!(parse_outline_json("no json here").is_err());
    }

    #[tokio::test]
    async fn model_path_wins_when_valid() {
        let generator = Canned(Ok(
            r#"{"title": "", "sections": [{"key": "A", "title": "Alpha"}]}"#.into(),
        ));
        let extractor = StructureExtractor::new(&generator, "Default");
        let outline = extractor.extract("## Something else").await.unwrap();
        assert_eq!(keys(&outline), vec!["A"]);
        assert_eq!(outline.title, "Default");
    }

    #[tokio::test]
    async fn model_failure_falls_back_to_scan() {
        let generator = Canned(Err("HTTP 500".into()));
        let extractor = StructureExtractor::new(&generator, "Default");
        let outline = extractor.extract("## Alpha\n## Beta").await.unwrap();
        assert_eq!(keys(&outline), vec!["ALPHA", "BETA"]);
    }
}
