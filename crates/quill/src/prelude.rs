//! Convenience re-exports for common `quill` types.
//!
//! ```ignore
//! use quill::prelude::*;
//! ```
//!
//! Covers wiring a session end to end: the OpenRouter client and
//! generator, a document service, the state machine with its config,
//! sessions and event handlers. Lower-level pieces (markers, request
//! types, streaming events) stay in their modules.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{DEFAULT_MODEL, Message, OpenRouterClient, json_schema_for};

// ── Generation and retrieval ────────────────────────────────────────
pub use crate::generation::{GenerationRequest, OpenRouterGenerator, Purpose, TextGenerator};
pub use crate::retrieval::{NoRetrieval, Retriever, StaticRetriever};

// ── Documents ───────────────────────────────────────────────────────
pub use crate::docs::{
    AcademicFormatter, DocumentService, DocumentWriter, EnvToken, FormatStyle, GoogleDocsClient,
    InMemoryDocuments, StaticToken,
};

// ── Authoring ───────────────────────────────────────────────────────
pub use crate::authoring::{
    Authoring, AuthoringEvent, CompositeEventHandler, EventHandler, FnEventHandler,
    LoggingHandler, NoopHandler, Outline, Phase, PhrasePolicy, Reply, SectionDescriptor,
    SessionState, SessionStore,
};
pub use crate::config::AuthoringConfig;

// ── Errors and retry ────────────────────────────────────────────────
pub use crate::api::{RetryConfig, RoutingStrategy};
pub use crate::error::{AuthoringError, DocsError};
