//! Events emitted while a turn runs, and handlers for them.
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or headless runs |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures, e.g. printing streamed text |
//! | [`CompositeEventHandler`] | Several handlers in order |

use super::outline::Outline;
use super::session::{Phase, SectionStatus};
use tracing::{debug, info, warn};

/// Something observable happened during [`Authoring::handle_message`].
///
/// [`Authoring::handle_message`]: super::machine::Authoring::handle_message
#[derive(Debug)]
pub enum AuthoringEvent<'a> {
    PhaseChanged { from: Phase, to: Phase },
    /// Incremental generated text (streaming mode only).
    TextDelta(&'a str),
    /// A proposal was turned into an outline.
    OutlineDetected(&'a Outline),
    SkeletonCreated {
        document_id: &'a str,
        sections: usize,
    },
    SectionStatusChanged {
        key: &'a str,
        status: SectionStatus,
    },
    SectionWritten {
        document_id: &'a str,
        key: &'a str,
    },
    /// Markers were stripped from the finished document.
    Finalized {
        document_id: &'a str,
        removed: usize,
    },
    /// A step failed and was rolled back.
    StepFailed { step: &'a str, error: &'a str },
    /// Document credentials were revoked; the turn was rolled back.
    ReauthorizationRequired { url: Option<&'a str> },
}

/// Observer of [`AuthoringEvent`]s. The default ignores everything.
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &AuthoringEvent<'_>) {
        let _ = event;
    }
}

pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// Wraps a closure into an [`EventHandler`].
///
/// ```ignore
/// let handler = FnEventHandler::new(|event| {
///     if let AuthoringEvent::TextDelta(text) = event {
///         print!("{text}");
///     }
/// });
/// ```
pub struct FnEventHandler<F>(F)
where
    F: Fn(&AuthoringEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&AuthoringEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&AuthoringEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &AuthoringEvent<'_>) {
        (self.0)(event)
    }
}

/// Dispatches every event to each inner handler, in registration order.
#[derive(Default)]
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Add `handler` only when `condition` holds.
    pub fn with_if(self, condition: bool, handler: impl EventHandler + 'static) -> Self {
        if condition { self.with(handler) } else { self }
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &AuthoringEvent<'_>) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}

/// Logs events through `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &AuthoringEvent<'_>) {
        match event {
            AuthoringEvent::PhaseChanged { from, to } => {
                info!("Phase {from} -> {to}");
            }
            AuthoringEvent::TextDelta(_) => {}
            AuthoringEvent::OutlineDetected(outline) => {
                let keys: Vec<&str> = outline.keys().collect();
                info!("Outline \"{}\": {}", outline.title, keys.join(", "));
            }
            AuthoringEvent::SkeletonCreated {
                document_id,
                sections,
            } => {
                info!("Skeleton {document_id} created with {sections} sections");
            }
            AuthoringEvent::SectionStatusChanged { key, status } => {
                debug!("Section {key}: {status:?}");
            }
            AuthoringEvent::SectionWritten { document_id, key } => {
                info!("Section {key} written to {document_id}");
            }
            AuthoringEvent::Finalized {
                document_id,
                removed,
            } => {
                info!("Document {document_id} finalized ({removed} markers removed)");
            }
            AuthoringEvent::StepFailed { step, error } => {
                warn!("Step {step} failed: {error}");
            }
            AuthoringEvent::ReauthorizationRequired { url } => {
                warn!(
                    "Document access revoked; re-authorization required{}",
                    url.map(|u| format!(" at {u}")).unwrap_or_default()
                );
            }
        }
    }
}
