//! Context retrieval seam.
//!
//! A [`Retriever`] turns a query into a formatted context block that is
//! spliced into generation input. Chunk indexing and ingestion live outside
//! this crate; [`StaticRetriever`] covers plain-text sources already in
//! memory or on disk.

use std::collections::HashSet;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use tracing::debug;

/// Boxed future returned by [`Retriever::context`].
pub type RetrievalFuture<'a> = Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>>;

/// Supplies context for a query.
pub trait Retriever: Send + Sync {
    /// Formatted context for `query`. With `full_coverage`, the result
    /// includes at least one excerpt from every known source.
    fn context<'a>(&'a self, query: &'a str, full_coverage: bool) -> RetrievalFuture<'a>;
}

/// Retriever with no sources. Always returns an empty context.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRetrieval;

impl Retriever for NoRetrieval {
    fn context<'a>(&'a self, _query: &'a str, _full_coverage: bool) -> RetrievalFuture<'a> {
        Box::pin(async { Ok(String::new()) })
    }
}

/// One named source document split into paragraphs.
#[derive(Debug, Clone)]
struct Source {
    name: String,
    paragraphs: Vec<String>,
}

/// Keyword-overlap retriever over a fixed set of text sources.
#[derive(Debug, Clone)]
pub struct StaticRetriever {
    sources: Vec<Source>,
    max_excerpts: usize,
}

impl Default for StaticRetriever {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            max_excerpts: 6,
        }
    }
}

impl StaticRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum excerpts returned for a plain (not full-coverage) query.
    pub fn with_max_excerpts(mut self, max: usize) -> Self {
        self.max_excerpts = max.max(1);
        self
    }

    /// Add a source. Paragraphs are separated by blank lines.
    pub fn with_source(mut self, name: impl Into<String>, text: &str) -> Self {
        let paragraphs: Vec<String> = text
            .split("\n\n")
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        if !paragraphs.is_empty() {
            self.sources.push(Source {
                name: name.into(),
                paragraphs,
            });
        }
        self
    }

    /// Load every `.txt` and `.md` file in `dir` as a source.
    pub fn from_dir(dir: &Path) -> Result<Self, String> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| format!("failed to read {}: {e}", dir.display()))?;
        let mut paths: Vec<_> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e == "txt" || e == "md")
            })
            .collect();
        paths.sort();

        let mut retriever = Self::new();
        for path in paths {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            retriever = retriever.with_source(name, &text);
        }
        debug!("Loaded {} retrieval sources", retriever.sources.len());
        Ok(retriever)
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    fn select(&self, query: &str, full_coverage: bool) -> Vec<(usize, usize)> {
        let terms = terms_of(query);
        let mut scored: Vec<(usize, usize, usize)> = Vec::new();
        for (si, source) in self.sources.iter().enumerate() {
            for (pi, paragraph) in source.paragraphs.iter().enumerate() {
                let words = terms_of(paragraph);
                let score = terms.iter().filter(|t| words.contains(*t)).count();
                scored.push((score, si, pi));
            }
        }
        // Highest score first; ties keep document order.
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

        let mut picked: Vec<(usize, usize)> = Vec::new();
        if full_coverage {
            for si in 0..self.sources.len() {
                if let Some(&(_, s, p)) = scored.iter().find(|(_, s, _)| *s == si) {
                    picked.push((s, p));
                }
            }
        }
        let limit = if full_coverage {
            picked.len() + self.max_excerpts
        } else {
            self.max_excerpts
        };
        for &(score, s, p) in &scored {
            if score == 0 || picked.len() >= limit {
                break;
            }
            if !picked.contains(&(s, p)) {
                picked.push((s, p));
            }
        }
        picked
    }
}

impl Retriever for StaticRetriever {
    fn context<'a>(&'a self, query: &'a str, full_coverage: bool) -> RetrievalFuture<'a> {
        Box::pin(async move {
            let picked = self.select(query, full_coverage);
            let mut out = String::new();
            for (s, p) in picked {
                let source = &self.sources[s];
                out.push_str(&format!("[{}]\n{}\n\n", source.name, source.paragraphs[p]));
            }
            Ok(out.trim_end().to_string())
        })
    }
}

fn terms_of(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 3)
        .map(|w| w.to_lowercase())
        .collect()
}
