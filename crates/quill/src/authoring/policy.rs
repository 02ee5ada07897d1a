//! Phrase lists and the matching built on them.
//!
//! Approval, negation and conversational filler are detected with bounded
//! keyword and prefix matching, no model call. The lists are tuned for
//! Portuguese and English chat and are not complete; replace them through
//! [`PhrasePolicy`] for other languages or styles.

use super::outline::SectionDescriptor;
use crate::docs::model::fold;

/// Messages longer than this many words are feedback, never approval.
const MAX_APPROVAL_WORDS: usize = 12;

/// Lines longer than this are content, never conversational filler.
const MAX_CONVERSATIONAL_CHARS: usize = 160;

/// Replaceable phrase lists. Entries are compared after [`normalize`].
#[derive(Debug, Clone)]
pub struct PhrasePolicy {
    /// Phrases that approve when they start the message or appear in a
    /// short one.
    pub approvals: Vec<String>,
    /// Words that also open feedback ("isso precisa...", "next time...").
    /// They approve only when the whole message is made of approval
    /// phrases.
    pub weak_approvals: Vec<String>,
    /// Words that cancel an approval.
    pub negations: Vec<String>,
    /// Contrast words ("but") that turn an approval into feedback.
    pub contrasts: Vec<String>,
    /// Prefixes of preamble and closing lines stripped from drafts.
    pub conversational_prefixes: Vec<String>,
    /// Keywords of questions about all sources at once.
    pub global_query_keywords: Vec<String>,
    /// Verbs that ask for a section to be redone.
    pub revision_verbs: Vec<String>,
}

fn list(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| normalize(s)).collect()
}

impl Default for PhrasePolicy {
    fn default() -> Self {
        Self {
            approvals: list(&[
                // pt
                "sim", "ok", "okay", "pode", "pode seguir", "pode prosseguir", "pode continuar",
                "aprovado", "aprovo", "aprovada", "perfeito", "ótimo", "otimo", "gostei",
                "concordo", "manda ver", "bora", "prossiga", "está bom", "esta bom", "tá bom",
                "ta bom", "tudo certo", "excelente", "beleza", "fechado",
                // en
                "yes", "yep", "yeah", "approve", "approved", "looks good", "lgtm", "go ahead",
                "proceed", "perfect", "sounds good", "agreed", "sure", "do it",
            ]),
            weak_approvals: list(&[
                "isso", "isso mesmo", "isso ai", "continue", "segue", "siga", "vamos", "certo",
                "show", "next", "fine", "great", "good", "very good",
            ]),
            negations: list(&[
                "não", "nao", "nunca", "nem", "espera", "no", "not", "nope", "never", "dont",
                "don't", "isnt", "wait",
            ]),
            contrasts: list(&[
                "mas", "porém", "porem", "contudo", "entretanto", "todavia", "exceto", "but",
                "however", "though", "although", "except",
            ]),
            conversational_prefixes: list(&[
                // pt
                "claro", "aqui está", "aqui esta", "segue abaixo", "segue a", "segue o",
                "com certeza", "certamente", "espero que", "se precisar", "posso ajudar",
                "fico à disposição", "fico a disposicao", "qualquer dúvida", "perfeito",
                "ótimo", "otimo", "vamos lá", "abaixo está",
                // en
                "sure", "here is", "here's", "heres", "certainly", "of course", "i hope",
                "hope this helps", "let me know", "feel free", "below is", "absolutely",
                "great question", "i've written", "ive written",
            ]),
            global_query_keywords: list(&[
                "resumo", "resuma", "resumir", "visão geral", "visao geral", "documento todo",
                "documento inteiro", "todos os documentos", "todas as fontes", "summary",
                "summarize", "summarise", "overview", "whole document", "all documents",
                "all sources", "entire",
            ]),
            revision_verbs: list(&[
                "revise", "revisar", "reescreva", "reescrever", "refaça", "refazer",
                "corrija", "corrigir", "melhore", "melhorar", "altere", "alterar", "ajuste",
                "ajustar", "mude", "mudar", "rewrite", "redo", "improve", "fix", "change",
                "update", "edit",
            ]),
        }
    }
}

/// Fold case and diacritics, drop apostrophes, turn other punctuation into
/// spaces and collapse whitespace.
pub fn normalize(text: &str) -> String {
    let folded: String = fold(text)
        .chars()
        .filter(|c| *c != '\'' && *c != '’')
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether `phrase` occurs in `text` on word boundaries. Both normalized.
fn contains_phrase(text: &str, phrase: &str) -> bool {
    !phrase.is_empty() && format!(" {text} ").contains(&format!(" {phrase} "))
}

fn starts_with_phrase(text: &str, phrase: &str) -> bool {
    !phrase.is_empty() && (text == phrase || text.starts_with(&format!("{phrase} ")))
}

impl PhrasePolicy {
    /// Whether `message` approves what was just shown.
    pub fn is_approval(&self, message: &str) -> bool {
        let text = normalize(message);
        let words: Vec<&str> = text.split(' ').filter(|w| !w.is_empty()).collect();
        if words.is_empty() || words.len() > MAX_APPROVAL_WORDS {
            return false;
        }
        let rejected = self
            .negations
            .iter()
            .chain(&self.contrasts)
            .any(|w| contains_phrase(&text, w));
        if rejected {
            return false;
        }
        if self.approvals.iter().any(|a| starts_with_phrase(&text, a)) {
            return true;
        }
        if self.only_approval_phrases(&text) {
            return true;
        }
        words.len() <= MAX_APPROVAL_WORDS / 2
            && self.approvals.iter().any(|a| contains_phrase(&text, a))
    }

    /// Whether normalized `text` is a sequence of approval phrases and
    /// nothing else, e.g. "great", "isso mesmo", "good good".
    fn only_approval_phrases(&self, text: &str) -> bool {
        let mut rest = text;
        while !rest.is_empty() {
            let longest = self
                .approvals
                .iter()
                .chain(&self.weak_approvals)
                .filter(|a| starts_with_phrase(rest, a))
                .map(String::len)
                .max();
            let Some(len) = longest else {
                return false;
            };
            rest = rest.get(len..).map_or("", str::trim_start);
        }
        true
    }

    fn is_conversational(&self, line: &str) -> bool {
        let trimmed = line.trim();
        if trimmed.chars().count() > MAX_CONVERSATIONAL_CHARS {
            return false;
        }
        let text = normalize(trimmed);
        self.conversational_prefixes
            .iter()
            .any(|p| starts_with_phrase(&text, p))
    }

    /// Drop preamble and closing lines (and blank lines around them) from a
    /// generated draft. Lines in the middle are never touched.
    pub fn strip_conversational(&self, draft: &str) -> String {
        let lines: Vec<&str> = draft.lines().collect();
        let skip = |l: &&str| l.trim().is_empty() || self.is_conversational(l);
        let start = lines.iter().position(|l| !skip(l)).unwrap_or(lines.len());
        let end = lines
            .iter()
            .rposition(|l| !skip(l))
            .map_or(start, |i| i + 1);
        lines
            .get(start..end.max(start))
            .unwrap_or_default()
            .join("\n")
    }

    /// Whether a question concerns every source rather than a passage.
    pub fn is_global_query(&self, message: &str) -> bool {
        let text = normalize(message);
        self.global_query_keywords
            .iter()
            .any(|k| contains_phrase(&text, k))
    }

    /// Whether `message` asks for something to be rewritten.
    pub fn is_revision_request(&self, message: &str) -> bool {
        let text = normalize(message);
        self.revision_verbs.iter().any(|v| contains_phrase(&text, v))
    }

    /// The section among `candidates` that `message` names, by title or by
    /// key. The longest matching name wins.
    pub fn mentioned_section<'s>(
        &self,
        message: &str,
        candidates: impl IntoIterator<Item = &'s SectionDescriptor>,
    ) -> Option<&'s SectionDescriptor> {
        let text = normalize(message);
        candidates
            .into_iter()
            .filter_map(|s| {
                let names = [normalize(&s.title), normalize(&s.key.replace('_', " "))];
                names
                    .into_iter()
                    .filter(|n| contains_phrase(&text, n))
                    .map(|n| n.len())
                    .max()
                    .map(|len| (len, s))
            })
            .max_by_key(|(len, _)| *len)
            .map(|(_, s)| s)
    }
}
