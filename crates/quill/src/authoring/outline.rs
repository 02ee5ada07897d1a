//! Document outline: title plus ordered sections.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One section of an outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SectionDescriptor {
    /// Normalized unique identifier, e.g. `INTRODUCTION` or `STATE_OF_THE_ART`.
    #[serde(default, alias = "chave", alias = "id")]
    pub key: String,
    /// Display title.
    #[serde(default, alias = "titulo", alias = "título")]
    pub title: String,
}

impl SectionDescriptor {
    pub fn new(title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            key: section_key(&title),
            title,
        }
    }

    /// Title to display, falling back to the key.
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.key
        } else {
            &self.title
        }
    }
}

/// Parsed document structure. Keys are unique and sections keep authoring
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Outline {
    /// Document title.
    #[serde(default, alias = "titulo", alias = "título")]
    pub title: String,
    /// Sections in authoring order.
    #[serde(default, alias = "secoes", alias = "seções")]
    pub sections: Vec<SectionDescriptor>,
}

impl Outline {
    pub fn new(title: impl Into<String>, sections: Vec<SectionDescriptor>) -> Self {
        Self {
            title: title.into(),
            sections,
        }
    }

    /// Drop sections with an empty key or title, normalize keys, and keep
    /// only the first section for each key. `None` when nothing survives.
    pub fn sanitized(self) -> Option<Self> {
        let mut seen = HashSet::new();
        let sections: Vec<SectionDescriptor> = self
            .sections
            .into_iter()
            .filter(|s| !s.key.trim().is_empty() && !s.title.trim().is_empty())
            .map(|s| SectionDescriptor {
                key: section_key(&s.key),
                title: s.title.trim().to_string(),
            })
            .filter(|s| seen.insert(s.key.clone()))
            .collect();
        (!sections.is_empty()).then(|| Self {
            title: self.title.trim().to_string(),
            sections,
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.key.as_str())
    }

    pub fn section(&self, key: &str) -> Option<&SectionDescriptor> {
        self.sections.iter().find(|s| s.key == key)
    }

    /// Markdown list for echoing back to the user.
    pub fn to_markdown(&self) -> String {
        let mut out = format!("**{}**\n", self.title);
        for (i, section) in self.sections.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, section.display_title()));
        }
        out
    }
}

/// Key for a title: upper-cased, whitespace runs replaced with `_`.
pub fn section_key(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_upper_snake() {
        assert_eq!(section_key("Introdução"), "INTRODUÇÃO");
        assert_eq!(section_key("  Estado  da arte "), "ESTADO_DA_ARTE");
        assert_eq!(section_key("STATE_OF_ART"), "STATE_OF_ART");
    }

    #[test]
    fn sanitize_drops_empty_and_duplicates() {
        let outline = Outline::new(
            "T",
            vec![
                SectionDescriptor::new("Intro"),
                SectionDescriptor {
                    key: "".into(),
                    title: "No key".into(),
                },
                SectionDescriptor {
                    key: "intro".into(),
                    title: "Intro again".into(),
                },
                SectionDescriptor::new("Methods"),
            ],
        )
        .sanitized()
        .unwrap();
        let keys: Vec<_> = outline.keys().collect();
        assert_eq!(keys, vec!["INTRO", "METHODS"]);
    }

    #[test]
    fn sanitize_empty_is_none() {
        assert!(Outline::new("T", vec![]).sanitized().is_none());
    }

    #[test]
    fn accepts_portuguese_aliases() {
        let outline: Outline = serde_json::from_str(
            r#"{"titulo": "Relatório", "secoes": [{"key": "INTRO", "titulo": "Introdução"}]}"#,
        )
        .unwrap();
        assert_eq!(outline.title, "Relatório");
        assert_eq!(outline.sections[0].title, "Introdução");
    }

    #[test]
    fn schema_lists_sections() {
        let schema = crate::json_schema_for::<Outline>();
        assert!(schema["properties"]["sections"].is_object());
    }
}
