//! Per-conversation state and its store.
//!
//! A [`SessionState`] is a plain value: the state machine mutates it through
//! `&mut`, and the caller decides where it lives. [`SessionStore`] keeps one
//! per session id in memory and, when given a directory, persists each as
//! `{dir}/{session_id}.json` with an atomic write (temp file, then rename).

use super::outline::Outline;
use crate::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Workflow phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Idle: classifies messages, answers questions, feeds the queue.
    #[default]
    Routing,
    /// Proposing or refining a document structure.
    Drafting,
    /// An outline was shown; waiting for approval or feedback.
    AwaitingStructureApproval,
    /// A section draft was shown; waiting for approval or feedback.
    AwaitingContentApproval,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Routing => "routing",
            Phase::Drafting => "drafting",
            Phase::AwaitingStructureApproval => "awaiting_structure_approval",
            Phase::AwaitingContentApproval => "awaiting_content_approval",
        };
        f.write_str(name)
    }
}

/// Lifecycle of one section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    Queued,
    Generating,
    AwaitingApproval,
    Completed,
}

/// One section's progress through the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionRecord {
    pub key: String,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    pub status: SectionStatus,
}

impl SectionRecord {
    pub fn queued(key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            content: None,
            status: SectionStatus::Queued,
        }
    }
}

/// Everything the state machine knows about one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    pub phase: Phase,
    #[serde(default)]
    pub outline: Option<Outline>,
    #[serde(default)]
    pub document_id: Option<String>,
    /// Sections still to be generated, head first.
    #[serde(default)]
    pub queue: VecDeque<SectionRecord>,
    /// Keys written to the document, in completion order.
    #[serde(default)]
    pub completed: Vec<String>,
    /// The section shown to the user and awaiting approval.
    #[serde(default)]
    pub pending: Option<SectionRecord>,
    /// Prior turns, oldest first, bounded.
    #[serde(default)]
    pub history: Vec<Message>,
    /// Most recent structure proposal shown to the user.
    #[serde(default)]
    pub last_proposal: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new(session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            phase: Phase::Routing,
            outline: None,
            document_id: None,
            queue: VecDeque::new(),
            completed: Vec::new(),
            pending: None,
            history: Vec::new(),
            last_proposal: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a turn, dropping the oldest beyond `max`.
    pub fn push_history(&mut self, message: Message, max: usize) {
        self.history.push(message);
        if self.history.len() > max {
            let excess = self.history.len() - max;
            self.history.drain(..excess);
        }
    }

    pub fn is_completed(&self, key: &str) -> bool {
        self.completed.iter().any(|k| k == key)
    }

    /// Forget everything except the id. The remote document is left alone.
    pub fn reset(&mut self) {
        *self = Self::new(std::mem::take(&mut self.session_id));
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Session states keyed by session id.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<String, SessionState>,
    dir: Option<PathBuf>,
}

impl SessionStore {
    /// A store that never touches the disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// A store persisting sessions under `dir` (created if missing).
    pub fn with_dir(dir: impl Into<PathBuf>) -> Result<Self, String> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| format!("Failed to create sessions dir: {e}"))?;
        Ok(Self {
            sessions: HashMap::new(),
            dir: Some(dir),
        })
    }

    /// The state for `session_id`, loaded from disk or created on first use.
    pub fn get_or_create(&mut self, session_id: &str) -> Result<&mut SessionState, String> {
        if !self.sessions.contains_key(session_id) {
            let state = match self.load(session_id)? {
                Some(state) => state,
                None => SessionState::new(session_id),
            };
            self.sessions.insert(session_id.to_string(), state);
        }
        self.sessions
            .get_mut(session_id)
            .ok_or_else(|| format!("session {session_id} vanished"))
    }

    /// Discard the state for `session_id`, in memory and on disk.
    pub fn reset(&mut self, session_id: &str) -> Result<(), String> {
        self.sessions.remove(session_id);
        if let Some(path) = self.path_for(session_id)?
            && path.exists()
        {
            std::fs::remove_file(&path).map_err(|e| format!("Failed to remove session: {e}"))?;
        }
        debug!("Reset session {session_id}");
        Ok(())
    }

    /// Persist the in-memory state of `session_id`. No-op without a dir.
    pub fn save(&self, session_id: &str) -> Result<(), String> {
        let (Some(dir), Some(state)) = (&self.dir, self.sessions.get(session_id)) else {
            return Ok(());
        };
        check_id(session_id)?;
        let final_path = dir.join(format!("{session_id}.json"));
        let tmp_path = dir.join(format!(".{session_id}.json.tmp"));

        let json = serde_json::to_string_pretty(state)
            .map_err(|e| format!("Failed to serialize session: {e}"))?;
        std::fs::write(&tmp_path, json)
            .map_err(|e| format!("Failed to write temp session: {e}"))?;
        std::fs::rename(&tmp_path, &final_path)
            .map_err(|e| format!("Failed to rename session: {e}"))?;
        Ok(())
    }

    /// Read a persisted state. `None` if there is none.
    pub fn load(&self, session_id: &str) -> Result<Option<SessionState>, String> {
        let Some(path) = self.path_for(session_id)? else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        let json =
            std::fs::read_to_string(&path).map_err(|e| format!("Failed to read session: {e}"))?;
        let state = serde_json::from_str(&json)
            .map_err(|e| format!("Failed to parse session: {e}"))?;
        Ok(Some(state))
    }

    /// Ids of every session known in memory or on disk, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.keys().cloned().collect();
        if let Some(dir) = &self.dir
            && let Ok(entries) = std::fs::read_dir(dir)
        {
            for entry in entries.flatten() {
                let name = entry.file_name().to_string_lossy().into_owned();
                if let Some(id) = name.strip_suffix(".json")
                    && !name.starts_with('.')
                    && !ids.iter().any(|i| i == id)
                {
                    ids.push(id.to_string());
                }
            }
        }
        ids.sort();
        ids
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    fn path_for(&self, session_id: &str) -> Result<Option<PathBuf>, String> {
        match &self.dir {
            Some(dir) => {
                check_id(session_id)?;
                Ok(Some(dir.join(format!("{session_id}.json"))))
            }
            None => Ok(None),
        }
    }
}

/// Session ids become file names; keep them to a safe alphabet.
fn check_id(session_id: &str) -> Result<(), String> {
    let ok = !session_id.is_empty()
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(format!("invalid session id '{session_id}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_bounded() {
        let mut state = SessionState::new("s");
        for i in 0..5 {
            state.push_history(Message::user(format!("m{i}")), 3);
        }
        let contents: Vec<_> = state.history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn reset_keeps_id_only() {
        let mut state = SessionState::new("abc");
        state.phase = Phase::Drafting;
        state.document_id = Some("doc".into());
        state.queue.push_back(SectionRecord::queued("A", "A"));
        state.reset();
        assert_eq!(state.session_id, "abc");
        assert_eq!(state.phase, Phase::Routing);
        assert!(state.document_id.is_none());
        assert!(state.queue.is_empty());
    }

    #[test]
    fn phase_serializes_snake_case() {
        let json = serde_json::to_string(&Phase::AwaitingContentApproval).unwrap();
        assert_eq!(json, "\"awaiting_content_approval\"");
    }

    #[test]
    fn store_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = SessionStore::with_dir(dir.path()).unwrap();
            let state = store.get_or_create("s-1").unwrap();
            state.phase = Phase::AwaitingStructureApproval;
            state.last_proposal = Some("## A".into());
            store.save("s-1").unwrap();
            assert!(!dir.path().join(".s-1.json.tmp").exists());
        }
        let mut store = SessionStore::with_dir(dir.path()).unwrap();
        assert_eq!(store.list(), vec!["s-1".to_string()]);
        let state = store.get_or_create("s-1").unwrap();
        assert_eq!(state.phase, Phase::AwaitingStructureApproval);
        assert_eq!(state.last_proposal.as_deref(), Some("## A"));
    }

    #[test]
    fn reset_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SessionStore::with_dir(dir.path()).unwrap();
        store.get_or_create("s").unwrap().phase = Phase::Drafting;
        store.save("s").unwrap();
        store.reset("s").unwrap();
        assert!(!dir.path().join("s.json").exists());
        assert_eq!(store.get_or_create("s").unwrap().phase, Phase::Routing);
    }

    #[test]
    fn rejects_path_like_ids() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SessionStore::with_dir(dir.path()).unwrap();
        assert!(store.get_or_create("../etc").is_err());
        // In memory any id is fine.
        let mut memory = SessionStore::in_memory();
        assert!(memory.get_or_create("../etc").is_ok());
    }
}
