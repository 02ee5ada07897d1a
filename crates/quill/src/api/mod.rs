//! API interaction layer: retry, streaming and model routing.
//!
//! - [`retry`]: transient error detection with exponential backoff and
//!   random jitter, shared by the LLM client and the document client.
//! - [`streaming`]: SSE parser for incremental text deltas from the chat
//!   completions endpoint.
//! - [`router`]: [`RoutingStrategy`] for per-purpose model selection.

pub mod retry;
pub mod router;
pub mod streaming;

pub use retry::{RetryConfig, Retryable, retry_call};
pub use router::RoutingStrategy;
