//! The authoring state machine.
//!
//! One call to [`Authoring::handle_message`] is one turn: the user message
//! is interpreted according to the session's [`Phase`], the model and the
//! document are called as needed, and the session is updated in place.
//!
//! Steps commit their changes to the session only after their remote calls
//! succeed, so a failed step leaves the session as it found it. Steps that
//! completed earlier in the same turn stay committed. When document access
//! is revoked the whole turn is undone instead.

use super::events::{AuthoringEvent, EventHandler, NoopHandler};
use super::extract::StructureExtractor;
use super::outline::{Outline, SectionDescriptor};
use super::prompts;
use super::session::{Phase, SectionRecord, SectionStatus, SessionState};
use crate::Message;
use crate::config::AuthoringConfig;
use crate::docs::{AcademicFormatter, DocumentService, DocumentWriter};
use crate::error::AuthoringError;
use crate::generation::{GenerationRequest, Purpose, TextGenerator};
use crate::retrieval::{NoRetrieval, Retriever};
use tracing::{debug, info, warn};

/// Reply to a failed step that was rolled back.
pub const STEP_FAILED_REPLY: &str =
    "Sorry, I could not complete this step. Your progress is saved; please try again.";

const APPROVE_STRUCTURE_HINT: &str =
    "Reply \"ok\" to create the document with this structure, or tell me what to change.";

const APPROVE_SECTION_HINT: &str =
    "Reply \"ok\" to save this section to the document, or tell me what to change.";

const NO_STRUCTURE_HINT: &str = "I could not find a list of sections in that proposal. \
     Tell me which sections the document should have.";

/// Outcome of one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    /// Phase after the turn.
    pub phase: Phase,
    pub document_id: Option<String>,
    /// Document credentials must be renewed before retrying.
    pub reauthorization_required: bool,
}

/// What the classifier made of a message in [`Phase::Routing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Write,
    Query,
    Other,
}

impl Intent {
    /// Read the classifier's one-word answer. Anything unrecognized is
    /// [`Intent::Other`].
    pub fn parse(output: &str) -> Self {
        let word = output
            .split(|c: char| !c.is_ascii_alphabetic())
            .find(|w| !w.is_empty())
            .unwrap_or_default()
            .to_ascii_uppercase();
        match word.as_str() {
            "WRITE" => Intent::Write,
            "QUERY" => Intent::Query,
            _ => Intent::Other,
        }
    }
}

/// Link to a Google Docs document.
pub fn document_url(document_id: &str) -> String {
    format!("https://docs.google.com/document/d/{document_id}/edit")
}

/// Drives sessions through the authoring workflow.
pub struct Authoring<'a> {
    generator: &'a dyn TextGenerator,
    docs: &'a dyn DocumentService,
    config: &'a AuthoringConfig,
    retriever: &'a dyn Retriever,
    events: &'a dyn EventHandler,
}

impl<'a> Authoring<'a> {
    pub fn new(
        generator: &'a dyn TextGenerator,
        docs: &'a dyn DocumentService,
        config: &'a AuthoringConfig,
    ) -> Self {
        Self {
            generator,
            docs,
            config,
            retriever: &NoRetrieval,
            events: &NoopHandler,
        }
    }

    pub fn with_retriever(mut self, retriever: &'a dyn Retriever) -> Self {
        self.retriever = retriever;
        self
    }

    pub fn with_event_handler(mut self, events: &'a dyn EventHandler) -> Self {
        self.events = events;
        self
    }

    fn writer(&self) -> DocumentWriter<'a> {
        DocumentWriter::new(self.docs, AcademicFormatter::new(self.config.style))
    }

    /// Run one turn for `message` against `state`.
    pub async fn handle_message(&self, state: &mut SessionState, message: &str) -> Reply {
        let message = message.trim();
        let snapshot = state.clone();
        debug!(
            "Session {} turn in phase {}: {} chars",
            state.session_id,
            state.phase,
            message.len()
        );

        let text = match self.step(state, message).await {
            Ok(text) => text,
            Err(e) if e.is_auth_revoked() => {
                *state = snapshot;
                let url = self.config.reauthorize_url.as_deref();
                self.events
                    .on_event(&AuthoringEvent::ReauthorizationRequired { url });
                return Reply {
                    text: reauthorization_text(url),
                    phase: state.phase,
                    document_id: state.document_id.clone(),
                    reauthorization_required: true,
                };
            }
            Err(e) => {
                let error = e.to_string();
                warn!("Session {}: step failed: {error}", state.session_id);
                self.events.on_event(&AuthoringEvent::StepFailed {
                    step: step_name(state.phase),
                    error: &error,
                });
                STEP_FAILED_REPLY.to_string()
            }
        };

        let max = self.config.max_history_messages;
        state.push_history(Message::user(message), max);
        state.push_history(Message::assistant(text.as_str()), max);
        state.touch();

        Reply {
            text,
            phase: state.phase,
            document_id: state.document_id.clone(),
            reauthorization_required: false,
        }
    }

    async fn step(
        &self,
        state: &mut SessionState,
        message: &str,
    ) -> Result<String, AuthoringError> {
        match state.phase {
            Phase::Routing => self.route(state, message).await,
            Phase::Drafting => self.draft_structure(state, message).await,
            Phase::AwaitingStructureApproval => self.review_structure(state, message).await,
            Phase::AwaitingContentApproval => self.review_section(state, message).await,
        }
    }

    fn set_phase(&self, state: &mut SessionState, to: Phase) {
        let from = state.phase;
        if from != to {
            state.phase = to;
            info!("Session {}: {from} -> {to}", state.session_id);
            self.events.on_event(&AuthoringEvent::PhaseChanged { from, to });
        }
    }

    fn set_status(&self, record: &mut SectionRecord, status: SectionStatus) {
        record.status = status;
        self.events.on_event(&AuthoringEvent::SectionStatusChanged {
            key: &record.key,
            status,
        });
    }

    // ── Routing ────────────────────────────────────────────────────

    async fn route(
        &self,
        state: &mut SessionState,
        message: &str,
    ) -> Result<String, AuthoringError> {
        if state.pending.is_none()
            && let Some(draft) = self.generate_next(state).await?
        {
            return Ok(draft);
        }

        if let Some(section) = self.revision_target(state, message) {
            return self.revise_completed(state, section, message).await;
        }

        let request = GenerationRequest::new(Purpose::Classify, prompts::CLASSIFY_SYSTEM, message);
        let intent = Intent::parse(&self.generate(request, false).await?);
        debug!("Classified message as {intent:?}");

        match intent {
            Intent::Write => {
                self.set_phase(state, Phase::Drafting);
                state.last_proposal = None;
                state.outline = None;
                self.draft_structure(state, message).await
            }
            Intent::Query => self.answer(state, message).await,
            Intent::Other => {
                let request =
                    GenerationRequest::new(Purpose::Converse, prompts::TRIAGE_SYSTEM, message)
                        .with_history(&state.history);
                self.generate(request, true).await
            }
        }
    }

    async fn answer(&self, state: &SessionState, question: &str) -> Result<String, AuthoringError> {
        let full_coverage = self.config.phrases.is_global_query(question);
        let context = self.context(question, full_coverage).await;
        let input = prompts::answer_input(question, &context);
        let request = GenerationRequest::new(Purpose::Answer, prompts::ANSWER_SYSTEM, &input)
            .with_history(&state.history);
        self.generate(request, true).await
    }

    /// A completed section the message asks to rewrite, if any.
    fn revision_target(&self, state: &SessionState, message: &str) -> Option<SectionDescriptor> {
        let outline = state.outline.as_ref()?;
        state.document_id.as_ref()?;
        let phrases = &self.config.phrases;
        if !phrases.is_revision_request(message) {
            return None;
        }
        let completed = outline
            .sections
            .iter()
            .filter(|s| state.is_completed(&s.key));
        phrases.mentioned_section(message, completed).cloned()
    }

    async fn revise_completed(
        &self,
        state: &mut SessionState,
        section: SectionDescriptor,
        feedback: &str,
    ) -> Result<String, AuthoringError> {
        let document_id = state
            .document_id
            .clone()
            .ok_or(AuthoringError::NoActiveDocument)?;
        let previous = match self.writer().read_section(&document_id, &section.key).await {
            Ok(text) => text,
            Err(e) if e.is_auth_revoked() => return Err(e.into()),
            Err(e) => {
                debug!("No readable draft for {}: {e}", section.key);
                String::new()
            }
        };

        let title = section.display_title().to_string();
        let mut record = SectionRecord::queued(section.key, title);
        record.content = Some(previous);
        info!("Re-opening completed section {}", record.key);
        self.redraft(state, record, feedback).await?;
        Ok(self.section_reply(state))
    }

    // ── Structure ──────────────────────────────────────────────────

    /// Propose (or refine) a structure and try to read an outline from it.
    async fn draft_structure(
        &self,
        state: &mut SessionState,
        message: &str,
    ) -> Result<String, AuthoringError> {
        let context = self.context(message, true).await;
        let previous = state.last_proposal.as_deref();
        let (system, input) = match previous {
            Some(previous) => (
                prompts::REFINE_STRUCTURE_SYSTEM,
                prompts::proposal_input(message, Some(previous), &context),
            ),
            None => (
                prompts::PROPOSE_STRUCTURE_SYSTEM,
                prompts::proposal_input(message, None, &context),
            ),
        };
        let request = GenerationRequest::new(Purpose::Propose, system, &input)
            .with_history(&state.history);
        let proposal = self.generate(request, true).await?;

        let extractor = StructureExtractor::new(self.generator, &self.config.default_title);
        let outline = extractor.extract(&proposal).await;

        state.last_proposal = Some(proposal.clone());
        match outline {
            Some(outline) => {
                self.events.on_event(&AuthoringEvent::OutlineDetected(&outline));
                state.outline = Some(outline);
                self.set_phase(state, Phase::AwaitingStructureApproval);
                Ok(format!("{proposal}\n\n{APPROVE_STRUCTURE_HINT}"))
            }
            None => {
                debug!("{}", AuthoringError::StructureExtractionFailed);
                state.outline = None;
                self.set_phase(state, Phase::Drafting);
                Ok(format!("{proposal}\n\n{NO_STRUCTURE_HINT}"))
            }
        }
    }

    async fn review_structure(
        &self,
        state: &mut SessionState,
        message: &str,
    ) -> Result<String, AuthoringError> {
        if !self.config.phrases.is_approval(message) {
            self.set_phase(state, Phase::Drafting);
            return self.draft_structure(state, message).await;
        }

        let outline = match state.outline.clone() {
            Some(outline) => Some(outline),
            None => match state.last_proposal.as_deref() {
                Some(proposal) => {
                    StructureExtractor::new(self.generator, &self.config.default_title)
                        .extract(proposal)
                        .await
                }
                None => None,
            },
        };
        let Some(outline) = outline else {
            debug!("{}", AuthoringError::StructureExtractionFailed);
            self.set_phase(state, Phase::Drafting);
            return Ok(NO_STRUCTURE_HINT.to_string());
        };

        let document_id = self.create_document(state, outline).await?;
        let header = format!(
            "Created the document: {}\n\n",
            document_url(&document_id)
        );
        match self.generate_next(state).await? {
            Some(draft) => Ok(header + &draft),
            None => Ok(header),
        }
    }

    /// Create the skeleton and reset the queue to every outline section.
    async fn create_document(
        &self,
        state: &mut SessionState,
        outline: Outline,
    ) -> Result<String, AuthoringError> {
        let title = if outline.title.trim().is_empty() {
            self.config.default_title.as_str()
        } else {
            outline.title.as_str()
        };
        let document_id = self.writer().create_skeleton(title, &outline).await?;
        self.events.on_event(&AuthoringEvent::SkeletonCreated {
            document_id: &document_id,
            sections: outline.sections.len(),
        });

        state.queue = outline
            .sections
            .iter()
            .map(|s| SectionRecord::queued(&s.key, s.display_title()))
            .collect();
        state.completed.clear();
        state.pending = None;
        state.document_id = Some(document_id.clone());
        state.outline = Some(outline);
        self.set_phase(state, Phase::Routing);
        Ok(document_id)
    }

    // ── Sections ───────────────────────────────────────────────────

    /// Draft the head of the queue. `None` when the queue is empty.
    ///
    /// The head stays in the queue until the draft exists; on failure it is
    /// returned to `queued`.
    async fn generate_next(
        &self,
        state: &mut SessionState,
    ) -> Result<Option<String>, AuthoringError> {
        let Some(head) = state.queue.front_mut() else {
            return Ok(None);
        };
        self.set_status(head, SectionStatus::Generating);
        let record = head.clone();

        let drafted = self.draft_section(state, &record, None).await;
        let content = match drafted {
            Ok(content) => content,
            Err(e) => {
                if let Some(head) = state.queue.front_mut() {
                    head.status = SectionStatus::Queued;
                }
                return Err(e);
            }
        };

        let Some(mut record) = state.queue.pop_front() else {
            return Ok(None);
        };
        record.content = Some(content);
        self.set_status(&mut record, SectionStatus::AwaitingApproval);
        state.pending = Some(record);
        self.set_phase(state, Phase::AwaitingContentApproval);
        Ok(Some(self.section_reply(state)))
    }

    /// Regenerate `record` with `feedback` and make it the pending section.
    async fn redraft(
        &self,
        state: &mut SessionState,
        mut record: SectionRecord,
        feedback: &str,
    ) -> Result<(), AuthoringError> {
        self.set_status(&mut record, SectionStatus::Generating);
        let content = self.draft_section(state, &record, Some(feedback)).await?;
        state.completed.retain(|k| *k != record.key);
        record.content = Some(content);
        self.set_status(&mut record, SectionStatus::AwaitingApproval);
        state.pending = Some(record);
        self.set_phase(state, Phase::AwaitingContentApproval);
        Ok(())
    }

    async fn draft_section(
        &self,
        state: &SessionState,
        record: &SectionRecord,
        feedback: Option<&str>,
    ) -> Result<String, AuthoringError> {
        let query = match feedback {
            Some(feedback) => format!("{} {feedback}", record.title),
            None => record.title.clone(),
        };
        let context = self.context(&query, false).await;

        let (system, input) = match feedback {
            Some(feedback) => (
                prompts::REVISE_SECTION_SYSTEM,
                prompts::revision_input(
                    &record.title,
                    record.content.as_deref().unwrap_or_default(),
                    feedback,
                    &context,
                ),
            ),
            None => {
                let (doc_title, outline) = match &state.outline {
                    Some(o) => (o.title.as_str(), o.to_markdown()),
                    None => (self.config.default_title.as_str(), String::new()),
                };
                (
                    prompts::WRITE_SECTION_SYSTEM,
                    prompts::section_input(doc_title, &outline, &record.title, &context),
                )
            }
        };

        let request = GenerationRequest::new(Purpose::WriteSection, system, &input);
        let text = self.generate(request, true).await?;
        let content = self.config.phrases.strip_conversational(&text);
        if content.trim().is_empty() {
            return Err(AuthoringError::Generation(format!(
                "empty draft for section {}",
                record.key
            )));
        }
        Ok(content)
    }

    async fn review_section(
        &self,
        state: &mut SessionState,
        message: &str,
    ) -> Result<String, AuthoringError> {
        let Some(pending) = state.pending.clone() else {
            warn!("Session {}: no pending section, routing", state.session_id);
            self.set_phase(state, Phase::Routing);
            return self.route(state, message).await;
        };

        if !self.config.phrases.is_approval(message) {
            self.redraft(state, pending, message).await?;
            return Ok(self.section_reply(state));
        }

        let document_id = state
            .document_id
            .clone()
            .ok_or(AuthoringError::NoActiveDocument)?;
        let writer = self.writer();
        let content = pending.content.as_deref().unwrap_or_default();
        writer
            .write_section(&document_id, &pending.key, content, &pending.title)
            .await?;

        let mut record = pending;
        self.set_status(&mut record, SectionStatus::Completed);
        self.events.on_event(&AuthoringEvent::SectionWritten {
            document_id: &document_id,
            key: &record.key,
        });
        if !state.is_completed(&record.key) {
            state.completed.push(record.key.clone());
        }
        state.pending = None;
        self.set_phase(state, Phase::Routing);
        let saved = format!("Saved \"{}\" to the document.", record.title);

        if let Some(draft) = self.generate_next(state).await? {
            return Ok(format!("{saved}\n\n{draft}"));
        }

        if self.config.finalize_on_completion {
            let removed = writer.finalize(&document_id).await?;
            self.events.on_event(&AuthoringEvent::Finalized {
                document_id: &document_id,
                removed,
            });
        }
        Ok(format!(
            "{saved} The document is complete: {}",
            document_url(&document_id)
        ))
    }

    fn section_reply(&self, state: &SessionState) -> String {
        match &state.pending {
            Some(record) => format!(
                "## {}\n\n{}\n\n{APPROVE_SECTION_HINT}",
                record.title,
                record.content.as_deref().unwrap_or_default()
            ),
            None => String::new(),
        }
    }

    // ── Collaborators ──────────────────────────────────────────────

    async fn generate(
        &self,
        request: GenerationRequest<'_>,
        stream: bool,
    ) -> Result<String, AuthoringError> {
        let forward = |delta: &str| self.events.on_event(&AuthoringEvent::TextDelta(delta));
        let ignore = |_: &str| {};
        let on_delta: &(dyn Fn(&str) + Send + Sync) = if stream { &forward } else { &ignore };
        self.generator
            .generate(request, on_delta)
            .await
            .map_err(AuthoringError::Generation)
    }

    /// Retrieval context; a failing retriever degrades to no context.
    async fn context(&self, query: &str, full_coverage: bool) -> String {
        match self.retriever.context(query, full_coverage).await {
            Ok(context) => context,
            Err(e) => {
                warn!("Retrieval failed, continuing without context: {e}");
                String::new()
            }
        }
    }
}

fn step_name(phase: Phase) -> &'static str {
    match phase {
        Phase::Routing => "route",
        Phase::Drafting => "draft_structure",
        Phase::AwaitingStructureApproval => "review_structure",
        Phase::AwaitingContentApproval => "review_section",
    }
}

fn reauthorization_text(url: Option<&str>) -> String {
    match url {
        Some(url) => format!(
            "Access to Google Docs was revoked or has expired. Please re-authorize at {url} \
             and send your message again."
        ),
        None => "Access to Google Docs was revoked or has expired. Please re-authorize \
                 and send your message again."
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_parsing() {
        assert_eq!(Intent::parse("WRITE"), Intent::Write);
        assert_eq!(Intent::parse("  query.\n"), Intent::Query);
        assert_eq!(Intent::parse("**Write**"), Intent::Write);
        assert_eq!(Intent::parse("OTHER"), Intent::Other);
        assert_eq!(Intent::parse(""), Intent::Other);
        assert_eq!(Intent::parse("I think WRITE"), Intent::Other);
    }

    #[test]
    fn reauthorization_mentions_url() {
        assert!(reauthorization_text(Some("https://x/auth")).contains("https://x/auth"));
        assert!(reauthorization_text(None).contains("re-authorize"));
    }

    #[test]
    fn document_links() {
        assert_eq!(
            document_url("abc"),
            "https://docs.google.com/document/d/abc/edit"
        );
    }
}
