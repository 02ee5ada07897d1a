//! The authoring workflow: phases, outlines, approvals and sessions.
//!
//! [`Authoring`] drives a [`SessionState`] one user message at a time.
//! Structure proposals become [`Outline`]s through the
//! [`StructureExtractor`]; approved outlines become document skeletons and
//! a queue of sections, each drafted, shown and written on approval.

pub mod events;
pub mod extract;
pub mod machine;
pub mod outline;
pub mod policy;
pub mod prompts;
pub mod session;

pub use events::{
    AuthoringEvent, CompositeEventHandler, EventHandler, FnEventHandler, LoggingHandler,
    NoopHandler,
};
pub use extract::StructureExtractor;
pub use machine::{Authoring, Intent, Reply};
pub use outline::{Outline, SectionDescriptor};
pub use policy::PhrasePolicy;
pub use session::{Phase, SectionRecord, SectionStatus, SessionState, SessionStore};
