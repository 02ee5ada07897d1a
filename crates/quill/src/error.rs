//! Typed errors for the document layer and the authoring state machine.
//!
//! The document client and writer raise [`DocsError`]; the state machine
//! wraps those (and generation failures) in [`AuthoringError`]. Only
//! [`DocsError::Busy`] is transient: the retry wrapper absorbs it, and a
//! client that runs out of retries reports it as [`DocsError::Api`], so by
//! the time an error reaches the state machine it is final.

use crate::api::retry::Retryable;
use thiserror::Error;

/// Failure talking to the hosted document service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocsError {
    /// Generic remote failure (bad request, quota, malformed response, ...).
    #[error("document API error: {0}")]
    Api(String),

    /// Rate limit or transient-busy signal. Retried with backoff.
    #[error("document API busy (HTTP {status}): {message}")]
    Busy { status: u16, message: String },

    /// The document, or the anchor being looked up, does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Credentials are invalid, expired or revoked. Never retried.
    #[error("document access revoked: {0}")]
    AuthRevoked(String),
}

impl DocsError {
    /// Map an HTTP status and body to the error taxonomy.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = body.chars().take(500).collect::<String>();
        match status {
            401 => DocsError::AuthRevoked(message),
            404 => DocsError::NotFound(message),
            429 | 500 | 502 | 503 | 504 => DocsError::Busy { status, message },
            _ => DocsError::Api(format!("HTTP {status}: {message}")),
        }
    }

    /// Map a transport-level failure. Timeouts and connection resets count
    /// as busy; everything else is a plain API error.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            DocsError::Busy {
                status: 0,
                message: err.to_string(),
            }
        } else {
            DocsError::Api(format!("request failed: {err}"))
        }
    }

    pub fn is_auth_revoked(&self) -> bool {
        matches!(self, DocsError::AuthRevoked(_))
    }

    /// The error to report once retries are used up: busy becomes a plain
    /// API error, everything else is unchanged.
    pub fn exhausted(self) -> Self {
        match self {
            DocsError::Busy { status, message } => {
                DocsError::Api(format!("still busy after retries (HTTP {status}): {message}"))
            }
            other => other,
        }
    }
}

impl Retryable for DocsError {
    fn is_transient(&self) -> bool {
        matches!(self, DocsError::Busy { .. })
    }
}

/// Failure of one authoring step.
#[derive(Error, Debug)]
pub enum AuthoringError {
    #[error(transparent)]
    Docs(#[from] DocsError),

    /// The generative model call failed.
    #[error("generation failed: {0}")]
    Generation(String),

    /// No outline could be extracted from the proposal. Soft: the machine
    /// stays in (or returns to) drafting.
    #[error("no document structure detected")]
    StructureExtractionFailed,

    /// A write was requested before a skeleton document exists.
    #[error("no active document for this session")]
    NoActiveDocument,
}

impl AuthoringError {
    pub fn is_auth_revoked(&self) -> bool {
        matches!(self, AuthoringError::Docs(e) if e.is_auth_revoked())
    }
}
