//! End-to-end authoring turns against the in-memory document service.
//!
//! The model is a script: each purpose has a queue of replies, with a
//! fixed default once the queue runs dry.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use quill::authoring::machine::STEP_FAILED_REPLY;
use quill::authoring::SectionStatus;
use quill::generation::GenerateFuture;
use quill::prelude::*;

// ── Scripted model ─────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Call {
    purpose: Purpose,
    system: String,
    input: String,
}

#[derive(Default)]
struct ScriptedModel {
    replies: Mutex<HashMap<Purpose, VecDeque<Result<String, String>>>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedModel {
    fn new() -> Self {
        Self::default()
    }

    fn reply(&self, purpose: Purpose, text: &str) -> &Self {
        self.push(purpose, Ok(text.to_string()))
    }

    fn fail(&self, purpose: Purpose, error: &str) -> &Self {
        self.push(purpose, Err(error.to_string()))
    }

    fn push(&self, purpose: Purpose, reply: Result<String, String>) -> &Self {
        self.replies
            .lock()
            .unwrap()
            .entry(purpose)
            .or_default()
            .push_back(reply);
        self
    }

    fn calls(&self, purpose: Purpose) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.purpose == purpose)
            .cloned()
            .collect()
    }
}

fn default_reply(purpose: Purpose) -> Result<String, String> {
    match purpose {
        Purpose::Classify => Ok("OTHER".into()),
        Purpose::ExtractOutline => Err("not scripted".into()),
        Purpose::Propose => Ok("## Intro\n## Methods".into()),
        Purpose::WriteSection => Ok("Draft text.".into()),
        Purpose::Answer => Ok("I could not find that in your sources.".into()),
        Purpose::Converse => Ok("Hello! Tell me what you would like to write.".into()),
    }
}

impl TextGenerator for ScriptedModel {
    fn generate<'a>(
        &'a self,
        request: GenerationRequest<'a>,
        on_delta: &'a (dyn Fn(&str) + Send + Sync),
    ) -> GenerateFuture<'a> {
        self.calls.lock().unwrap().push(Call {
            purpose: request.purpose,
            system: request.system.to_string(),
            input: request.input.to_string(),
        });
        let reply = self
            .replies
            .lock()
            .unwrap()
            .get_mut(&request.purpose)
            .and_then(|q| q.pop_front())
            .unwrap_or_else(|| default_reply(request.purpose));
        if let Ok(text) = &reply {
            on_delta(text);
        }
        Box::pin(async move { reply })
    }
}

const OUTLINE_JSON: &str = r#"{"title": "Heat Islands", "sections": [
    {"key": "INTRO", "title": "Intro"},
    {"key": "METHODS", "title": "Methods"}
]}"#;

const REAUTH_URL: &str = "https://auth.example/start";

fn config() -> AuthoringConfig {
    AuthoringConfig::new("test-model").with_reauthorize_url(REAUTH_URL)
}

/// Script the turns up to an approved-outline-ready state.
fn script_proposal(model: &ScriptedModel) {
    model
        .reply(Purpose::Classify, "WRITE")
        .reply(Purpose::Propose, "Heat Islands\n\n## Intro\n## Methods")
        .reply(Purpose::ExtractOutline, OUTLINE_JSON);
}

// ── Full cycle ─────────────────────────────────────────────────────

#[tokio::test]
async fn full_cycle_writes_and_finalizes() {
    let model = ScriptedModel::new();
    script_proposal(&model);
    model
        .reply(
            Purpose::WriteSection,
            "Sure! Here is the introduction:\n\nCities are warming.\n\nHope this helps!",
        )
        .reply(Purpose::WriteSection, "Urban areas are warming.")
        .reply(Purpose::WriteSection, "Measurements at noon.");
    let docs = InMemoryDocuments::new();
    let config = config();

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let handler = FnEventHandler::new(move |event| {
        let name = match event {
            AuthoringEvent::SkeletonCreated { .. } => "skeleton",
            AuthoringEvent::SectionWritten { .. } => "written",
            AuthoringEvent::Finalized { .. } => "finalized",
            _ => return,
        };
        sink.lock().unwrap().push(name);
    });
    let authoring = Authoring::new(&model, &docs, &config).with_event_handler(&handler);
    let mut state = SessionState::new("s1");

    // Write intent: a proposal is shown and its outline detected.
    let reply = authoring
        .handle_message(&mut state, "I need a report on urban heat islands")
        .await;
    assert_eq!(reply.phase, Phase::AwaitingStructureApproval);
    assert!(reply.text.contains("## Intro"));
    let outline = state.outline.clone().unwrap();
    assert_eq!(outline.title, "Heat Islands");
    assert_eq!(outline.keys().collect::<Vec<_>>(), vec!["INTRO", "METHODS"]);

    // Approval: skeleton created, first section drafted and cleaned.
    let reply = authoring.handle_message(&mut state, "ok").await;
    assert_eq!(reply.phase, Phase::AwaitingContentApproval);
    let document_id = reply.document_id.clone().unwrap();
    assert!(docs.text(&document_id).unwrap().contains("[[START:INTRO]]"));
    let pending = state.pending.clone().unwrap();
    assert_eq!(pending.key, "INTRO");
    assert_eq!(pending.status, SectionStatus::AwaitingApproval);
    assert_eq!(pending.content.as_deref(), Some("Cities are warming."));
    assert_eq!(state.queue.len(), 1);

    // Feedback: the same section is redrafted with the previous draft.
    let reply = authoring
        .handle_message(&mut state, "Make it more formal")
        .await;
    assert_eq!(reply.phase, Phase::AwaitingContentApproval);
    assert_eq!(
        state.pending.as_ref().and_then(|p| p.content.as_deref()),
        Some("Urban areas are warming.")
    );
    let revision = model.calls(Purpose::WriteSection).pop().unwrap();
    assert!(revision.input.contains("Cities are warming."));
    assert!(revision.input.contains("Make it more formal"));

    // Approve the intro: written, next section drafted.
    let reply = authoring.handle_message(&mut state, "perfeito").await;
    assert_eq!(reply.phase, Phase::AwaitingContentApproval);
    assert_eq!(state.completed, vec!["INTRO".to_string()]);
    assert_eq!(state.pending.as_ref().map(|p| p.key.as_str()), Some("METHODS"));
    assert!(state.queue.is_empty());

    // Approve the last section: written and finalized.
    let reply = authoring.handle_message(&mut state, "sim").await;
    assert_eq!(reply.phase, Phase::Routing);
    assert!(reply.text.contains(&document_id));
    assert!(state.pending.is_none());
    assert_eq!(state.completed, vec!["INTRO", "METHODS"]);
    assert_eq!(
        docs.text(&document_id).unwrap(),
        "Heat Islands\nINTRO\nUrban areas are warming.\nMETHODS\nMeasurements at noon.\n\n"
    );

    assert_eq!(
        *events.lock().unwrap(),
        vec!["skeleton", "written", "written", "finalized"]
    );
    assert_eq!(state.history.len(), 10);
}

// ── Rollback ───────────────────────────────────────────────────────

#[tokio::test]
async fn revoked_access_during_structure_approval_rolls_back() {
    let model = ScriptedModel::new();
    script_proposal(&model);
    let docs = InMemoryDocuments::new();
    let config = config();
    let authoring = Authoring::new(&model, &docs, &config);
    let mut state = SessionState::new("s2");

    authoring
        .handle_message(&mut state, "Write a report on heat islands")
        .await;
    let before = state.clone();

    docs.inject_failure(DocsError::AuthRevoked("token expired".into()));
    let reply = authoring.handle_message(&mut state, "ok").await;

    assert!(reply.reauthorization_required);
    assert!(reply.text.contains(REAUTH_URL));
    assert_eq!(reply.phase, Phase::AwaitingStructureApproval);
    assert_eq!(state, before);
    assert!(state.queue.is_empty());
    assert!(state.pending.is_none());
    assert!(state.document_id.is_none());
    assert_eq!(docs.document_count(), 0);

    // Once access is back the same approval goes through.
    let reply = authoring.handle_message(&mut state, "ok").await;
    assert!(!reply.reauthorization_required);
    assert_eq!(reply.phase, Phase::AwaitingContentApproval);
    assert_eq!(docs.document_count(), 1);
}

#[tokio::test]
async fn revoked_access_during_content_approval_keeps_pending() {
    let model = ScriptedModel::new();
    script_proposal(&model);
    let docs = InMemoryDocuments::new();
    let config = config();
    let authoring = Authoring::new(&model, &docs, &config);
    let mut state = SessionState::new("s3");

    authoring.handle_message(&mut state, "Write a report").await;
    authoring.handle_message(&mut state, "ok").await;
    let before = state.clone();

    docs.inject_failure(DocsError::AuthRevoked("invalid_grant".into()));
    let reply = authoring.handle_message(&mut state, "ok").await;

    assert!(reply.reauthorization_required);
    assert_eq!(state, before);
    assert_eq!(state.pending.as_ref().map(|p| p.key.as_str()), Some("INTRO"));
    assert!(state.completed.is_empty());
    assert_eq!(state.queue.len(), 1);
}

#[tokio::test]
async fn failed_draft_leaves_queue_head_in_place() {
    let model = ScriptedModel::new();
    script_proposal(&model);
    model.fail(Purpose::WriteSection, "HTTP 500: upstream error");
    let docs = InMemoryDocuments::new();
    let config = config();
    let authoring = Authoring::new(&model, &docs, &config);
    let mut state = SessionState::new("s4");

    authoring.handle_message(&mut state, "Write a report").await;
    let reply = authoring.handle_message(&mut state, "ok").await;

    // The skeleton step committed; the draft step rolled back.
    assert_eq!(reply.text, STEP_FAILED_REPLY);
    assert!(!reply.reauthorization_required);
    assert_eq!(reply.phase, Phase::Routing);
    assert!(state.document_id.is_some());
    assert!(state.pending.is_none());
    let keys: Vec<&str> = state.queue.iter().map(|r| r.key.as_str()).collect();
    assert_eq!(keys, vec!["INTRO", "METHODS"]);
    assert_eq!(state.queue[0].status, SectionStatus::Queued);

    // Any next message resumes the queue.
    let reply = authoring.handle_message(&mut state, "continue").await;
    assert_eq!(reply.phase, Phase::AwaitingContentApproval);
    assert_eq!(state.pending.as_ref().map(|p| p.key.as_str()), Some("INTRO"));
    assert_eq!(state.queue.len(), 1);
}

#[tokio::test]
async fn failed_write_keeps_session_for_retry() {
    let model = ScriptedModel::new();
    script_proposal(&model);
    let docs = InMemoryDocuments::new();
    let config = config();
    let authoring = Authoring::new(&model, &docs, &config);
    let mut state = SessionState::new("s5");

    authoring.handle_message(&mut state, "Write a report").await;
    authoring.handle_message(&mut state, "ok").await;
    let before = (state.pending.clone(), state.queue.clone(), state.phase);

    docs.inject_failure(DocsError::Api("backend error".into()));
    let reply = authoring.handle_message(&mut state, "ok").await;
    assert_eq!(reply.text, STEP_FAILED_REPLY);
    assert_eq!((state.pending.clone(), state.queue.clone(), state.phase), before);
    assert!(state.completed.is_empty());
}

// ── Drafting ───────────────────────────────────────────────────────

#[tokio::test]
async fn proposal_without_structure_stays_in_drafting() {
    let model = ScriptedModel::new();
    model
        .reply(Purpose::Classify, "WRITE")
        .reply(Purpose::Propose, "What subject should the report cover?")
        .reply(Purpose::Propose, "1. Alpha\n2. Beta: details");
    let docs = InMemoryDocuments::new();
    let config = config().with_default_title("Draft Report");
    let authoring = Authoring::new(&model, &docs, &config);
    let mut state = SessionState::new("s6");

    let reply = authoring.handle_message(&mut state, "I want to write").await;
    assert_eq!(reply.phase, Phase::Drafting);
    assert!(state.outline.is_none());
    assert!(!reply.reauthorization_required);

    // The next message refines the previous proposal.
    let reply = authoring
        .handle_message(&mut state, "About rainwater harvesting")
        .await;
    assert_eq!(reply.phase, Phase::AwaitingStructureApproval);
    let outline = state.outline.clone().unwrap();
    assert_eq!(outline.title, "Draft Report");
    assert_eq!(outline.keys().collect::<Vec<_>>(), vec!["ALPHA", "BETA"]);

    let proposals = model.calls(Purpose::Propose);
    assert_eq!(proposals.len(), 2);
    assert_ne!(proposals[0].system, proposals[1].system);
    assert!(proposals[1].input.contains("What subject should the report cover?"));
}

#[tokio::test]
async fn structure_feedback_returns_to_drafting() {
    let model = ScriptedModel::new();
    script_proposal(&model);
    model.reply(Purpose::Propose, "## Intro\n## Methods\n## Conclusion");
    let docs = InMemoryDocuments::new();
    let config = config();
    let authoring = Authoring::new(&model, &docs, &config);
    let mut state = SessionState::new("s7");

    authoring.handle_message(&mut state, "Write a report").await;
    let reply = authoring
        .handle_message(&mut state, "ok, mas adicione uma conclusão")
        .await;

    assert_eq!(reply.phase, Phase::AwaitingStructureApproval);
    assert_eq!(docs.document_count(), 0);
    let keys: Vec<String> = state.outline.unwrap().keys().map(String::from).collect();
    assert_eq!(keys, vec!["INTRO", "METHODS", "CONCLUSION"]);
}

// ── Routing ────────────────────────────────────────────────────────

#[tokio::test]
async fn questions_are_answered_with_full_coverage_context() {
    let model = ScriptedModel::new();
    model
        .reply(Purpose::Classify, "QUERY")
        .reply(Purpose::Answer, "Your notes cover roof albedo and rainwater.");
    let retriever = StaticRetriever::new()
        .with_source("roofs.md", "Albedo of roofs reduces heat.")
        .with_source("water.md", "Rainwater harvesting in arid regions.");
    let docs = InMemoryDocuments::new();
    let config = config();
    let authoring = Authoring::new(&model, &docs, &config).with_retriever(&retriever);
    let mut state = SessionState::new("s8");

    let reply = authoring
        .handle_message(&mut state, "Give me an overview of my notes")
        .await;

    assert_eq!(reply.phase, Phase::Routing);
    assert_eq!(reply.text, "Your notes cover roof albedo and rainwater.");
    let answer = model.calls(Purpose::Answer).pop().unwrap();
    assert!(answer.input.contains("Albedo of roofs"));
    assert!(answer.input.contains("Rainwater harvesting"));
    assert_eq!(docs.document_count(), 0);
}

#[tokio::test]
async fn small_talk_gets_a_triage_reply() {
    let model = ScriptedModel::new();
    let docs = InMemoryDocuments::new();
    let config = config();
    let authoring = Authoring::new(&model, &docs, &config);
    let mut state = SessionState::new("s9");

    let reply = authoring.handle_message(&mut state, "hi there").await;
    assert_eq!(reply.phase, Phase::Routing);
    assert!(reply.text.starts_with("Hello!"));
    assert!(state.outline.is_none());
}

#[tokio::test]
async fn completed_section_can_be_revised() {
    let model = ScriptedModel::new();
    script_proposal(&model);
    model
        .reply(Purpose::WriteSection, "Urban areas are warming.")
        .reply(Purpose::WriteSection, "Measurements at noon.")
        .reply(Purpose::WriteSection, "Revised intro.");
    let docs = InMemoryDocuments::new();
    let config = config();
    let authoring = Authoring::new(&model, &docs, &config);
    let mut state = SessionState::new("s10");

    authoring.handle_message(&mut state, "Write a report").await;
    authoring.handle_message(&mut state, "ok").await;
    authoring.handle_message(&mut state, "ok").await;
    let reply = authoring.handle_message(&mut state, "ok").await;
    let document_id = reply.document_id.unwrap();
    assert_eq!(reply.phase, Phase::Routing);

    let reply = authoring
        .handle_message(&mut state, "Please rewrite the intro with more data")
        .await;
    assert_eq!(reply.phase, Phase::AwaitingContentApproval);
    assert_eq!(state.pending.as_ref().map(|p| p.key.as_str()), Some("INTRO"));
    assert_eq!(state.completed, vec!["METHODS"]);

    let reply = authoring.handle_message(&mut state, "ok").await;
    assert_eq!(reply.phase, Phase::Routing);
    assert_eq!(state.completed, vec!["METHODS", "INTRO"]);
    assert_eq!(
        docs.text(&document_id).unwrap(),
        "Heat Islands\nINTRO\nRevised intro.\nMETHODS\nMeasurements at noon.\n\n"
    );
}

#[tokio::test]
async fn store_round_trips_a_session_mid_workflow() {
    let model = ScriptedModel::new();
    script_proposal(&model);
    let docs = InMemoryDocuments::new();
    let config = config();
    let authoring = Authoring::new(&model, &docs, &config);
    let dir = tempfile::tempdir().unwrap();

    {
        let mut store = SessionStore::with_dir(dir.path()).unwrap();
        let state = store.get_or_create("thesis").unwrap();
        authoring.handle_message(state, "Write a report").await;
        store.save("thesis").unwrap();
    }

    let mut store = SessionStore::with_dir(dir.path()).unwrap();
    let state = store.get_or_create("thesis").unwrap();
    assert_eq!(state.phase, Phase::AwaitingStructureApproval);
    let reply = authoring.handle_message(state, "ok").await;
    assert_eq!(reply.phase, Phase::AwaitingContentApproval);
}
