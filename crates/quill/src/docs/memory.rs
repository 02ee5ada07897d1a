//! In-memory document service.
//!
//! Simulates the offset space of the hosted service closely enough for the
//! writer to be exercised without a network: text is held as UTF-16 code
//! units, the body starts at index 1 and ends with a newline that cannot be
//! deleted, empty ranges are rejected, and a batch either applies in full
//! or not at all. Failures can be queued with
//! [`InMemoryDocuments::inject_failure`].

use super::client::DocumentService;
use super::model::{
    Body, Document, Paragraph, ParagraphElement, ParagraphStyle, Range, Request,
    StructuralElement, TextRun,
};
use crate::error::DocsError;
use futures::future::BoxFuture;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone)]
struct StoredDocument {
    title: String,
    units: Vec<u16>,
    /// Named paragraph style per unit; only the value on a paragraph's
    /// newline is meaningful.
    styles: Vec<Option<String>>,
}

impl StoredDocument {
    fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            units: vec![u16::from(b'\n')],
            styles: vec![None],
        }
    }

    /// Index one past the final newline.
    fn end_index(&self) -> i64 {
        self.units.len() as i64 + 1
    }

    fn apply(&mut self, request: &Request) -> Result<(), DocsError> {
        match request {
            Request::InsertText(insert) => {
                let index = insert.location.index;
                if index < 1 || index >= self.end_index() {
                    return Err(DocsError::Api(format!(
                        "insertion index {index} outside body [1, {})",
                        self.end_index()
                    )));
                }
                let at = (index - 1) as usize;
                let new: Vec<u16> = insert.text.encode_utf16().collect();
                let count = new.len();
                self.units.splice(at..at, new);
                self.styles.splice(at..at, std::iter::repeat_n(None, count));
            }
            Request::DeleteContentRange(delete) => {
                let range = delete.range;
                self.check_range(range, "delete")?;
                // The final newline is not deletable.
                if range.end_index > self.end_index() - 1 {
                    return Err(DocsError::Api(format!(
                        "delete range {}..{} includes the final newline",
                        range.start_index, range.end_index
                    )));
                }
                let (a, b) = ((range.start_index - 1) as usize, (range.end_index - 1) as usize);
                self.units.drain(a..b);
                self.styles.drain(a..b);
            }
            Request::UpdateTextStyle(update) => {
                self.check_range(update.range, "text style")?;
            }
            Request::UpdateParagraphStyle(update) => {
                self.check_range(update.range, "paragraph style")?;
                if let Some(named) = &update.paragraph_style.named_style_type {
                    self.set_paragraph_style(update.range, named);
                }
            }
            Request::UpdateDocumentStyle(_) => {}
        }
        Ok(())
    }

    fn check_range(&self, range: Range, what: &str) -> Result<(), DocsError> {
        if range.end_index <= range.start_index {
            return Err(DocsError::Api(format!(
                "{what}: empty range {}..{}",
                range.start_index, range.end_index
            )));
        }
        if range.start_index < 1 || range.end_index > self.end_index() {
            return Err(DocsError::Api(format!(
                "{what}: range {}..{} outside body [1, {})",
                range.start_index,
                range.end_index,
                self.end_index()
            )));
        }
        Ok(())
    }

    /// Set the named style on every paragraph the range touches.
    fn set_paragraph_style(&mut self, range: Range, named: &str) {
        let newline = u16::from(b'\n');
        let first = (range.start_index - 1) as usize;
        let last = (range.end_index - 1) as usize;
        let mut i = first;
        while i < self.units.len() {
            if self.units[i] == newline {
                self.styles[i] = Some(named.to_string());
                if i + 1 >= last {
                    break;
                }
            }
            i += 1;
        }
    }

    fn to_document(&self, document_id: &str) -> Document {
        let newline = u16::from(b'\n');
        let mut content = Vec::new();
        let mut start = 0usize;
        for (i, unit) in self.units.iter().enumerate() {
            if *unit != newline {
                continue;
            }
            let text = String::from_utf16_lossy(&self.units[start..=i]);
            let (s, e) = (start as i64 + 1, i as i64 + 2);
            content.push(StructuralElement {
                start_index: s,
                end_index: e,
                paragraph: Some(Paragraph {
                    elements: vec![ParagraphElement {
                        start_index: s,
                        end_index: e,
                        text_run: Some(TextRun { content: text }),
                    }],
                    paragraph_style: self.styles[i].as_ref().map(|named| ParagraphStyle {
                        named_style_type: Some(named.clone()),
                        ..Default::default()
                    }),
                }),
                table: None,
            });
            start = i + 1;
        }
        Document {
            document_id: document_id.to_string(),
            title: self.title.clone(),
            body: Body { content },
        }
    }
}

#[derive(Debug, Default)]
struct State {
    documents: HashMap<String, StoredDocument>,
    failures: VecDeque<DocsError>,
    next_id: u64,
    batches: usize,
}

/// [`DocumentService`] held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryDocuments {
    state: Mutex<State>,
}

impl InMemoryDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call (of any kind) fail with `error`. Queued failures
    /// are consumed in order, one per call.
    pub fn inject_failure(&self, error: DocsError) {
        self.lock().failures.push_back(error);
    }

    /// Full body text of a document, final newline included.
    pub fn text(&self, document_id: &str) -> Option<String> {
        self.lock()
            .documents
            .get(document_id)
            .map(|d| String::from_utf16_lossy(&d.units))
    }

    /// Number of non-empty batches applied so far.
    pub fn batch_count(&self) -> usize {
        self.lock().batches
    }

    pub fn document_count(&self) -> usize {
        self.lock().documents.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A panic while holding the lock leaves the state usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn take_failure(state: &mut State) -> Result<(), DocsError> {
        match state.failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn create_now(&self, title: &str) -> Result<String, DocsError> {
        let mut state = self.lock();
        Self::take_failure(&mut state)?;
        state.next_id += 1;
        let id = format!("mem-doc-{}", state.next_id);
        state.documents.insert(id.clone(), StoredDocument::new(title));
        debug!("Created in-memory document {id}");
        Ok(id)
    }

    fn fetch_now(&self, document_id: &str) -> Result<Document, DocsError> {
        let mut state = self.lock();
        Self::take_failure(&mut state)?;
        state
            .documents
            .get(document_id)
            .map(|d| d.to_document(document_id))
            .ok_or_else(|| DocsError::NotFound(format!("document {document_id}")))
    }

    fn batch_now(&self, document_id: &str, requests: &[Request]) -> Result<(), DocsError> {
        let mut state = self.lock();
        Self::take_failure(&mut state)?;
        if requests.is_empty() {
            return Ok(());
        }
        let Some(stored) = state.documents.get(document_id) else {
            return Err(DocsError::NotFound(format!("document {document_id}")));
        };
        let mut draft = stored.clone();
        for (i, request) in requests.iter().enumerate() {
            draft
                .apply(request)
                .map_err(|e| DocsError::Api(format!("request {i}: {e}")))?;
        }
        state.documents.insert(document_id.to_string(), draft);
        state.batches += 1;
        Ok(())
    }
}

impl DocumentService for InMemoryDocuments {
    fn create<'a>(&'a self, title: &'a str) -> BoxFuture<'a, Result<String, DocsError>> {
        Box::pin(async move { self.create_now(title) })
    }

    fn fetch<'a>(&'a self, document_id: &'a str) -> BoxFuture<'a, Result<Document, DocsError>> {
        Box::pin(async move { self.fetch_now(document_id) })
    }

    fn batch_edit<'a>(
        &'a self,
        document_id: &'a str,
        requests: Vec<Request>,
    ) -> BoxFuture<'a, Result<(), DocsError>> {
        Box::pin(async move { self.batch_now(document_id, &requests) })
    }
}
