//! Section-by-section authoring of long structured documents into a hosted
//! rich-text document service.
//!
//! `quill` coordinates a generative model with a human approval loop and
//! writes the approved result into a remote document incrementally. The
//! interesting part is not the model call. It is keeping a remote document
//! consistent while spans addressed by absolute offsets are inserted,
//! replaced and deleted, and every edit shifts the offsets after it.
//!
//! # Getting started
//!
//! ```ignore
//! use quill::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), String> {
//!     let config = AuthoringConfig::new("anthropic/claude-sonnet-4")
//!         .with_streaming(true)
//!         .with_reauthorize_url("https://example.com/oauth/start");
//!
//!     let api_key = std::env::var("OPENROUTER_KEY").map_err(|e| e.to_string())?;
//!     let client = OpenRouterClient::new(api_key)?;
//!     let generator = OpenRouterGenerator::new(client, &config);
//!     let docs = GoogleDocsClient::new(EnvToken::new("GOOGLE_DOCS_TOKEN"), &config)
//!         .map_err(|e| e.to_string())?;
//!
//!     let mut store = SessionStore::in_memory();
//!     let session = store.get_or_create("demo")?;
//!
//!     let authoring = Authoring::new(&generator, &docs, &config)
//!         .with_event_handler(&LoggingHandler);
//!     let reply = authoring
//!         .handle_message(session, "I want to write a report on urban heat islands")
//!         .await;
//!     println!("{}", reply.text);
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! - **Talk to the document service:** [`DocumentService`](docs::client::DocumentService)
//!   is the seam; [`GoogleDocsClient`](docs::client::GoogleDocsClient) speaks the
//!   REST API and [`InMemoryDocuments`](docs::memory::InMemoryDocuments) simulates it.
//! - **Format content:** [`AcademicFormatter`](docs::formatter::AcademicFormatter)
//!   builds edit batches for headings and paragraphs.
//! - **Write sections safely:** [`DocumentWriter`](docs::writer::DocumentWriter)
//!   owns the marker protocol and offset-safe replacement.
//! - **Drive the workflow:** [`Authoring`](authoring::machine::Authoring) is the
//!   state machine; [`SessionState`](authoring::session::SessionState) is the
//!   per-conversation data it mutates.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`authoring`] | State machine, outline extraction, phrase policy, sessions, events |
//! | [`docs`] | Document client, in-memory service, formatter, markers, writer |
//! | [`generation`] | Text generation seam and the OpenRouter implementation |
//! | [`retrieval`] | Context retrieval seam |
//! | [`api`] | Retry with backoff, SSE streaming, model routing |

pub mod api;
pub mod authoring;
pub mod config;
pub mod docs;
pub mod error;
pub mod generation;
pub mod prelude;
pub mod retrieval;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

// Re-export schemars for downstream crates.
pub use schemars;

// ── Constants ──────────────────────────────────────────────────────

pub const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Default model for all LLM calls.
pub const DEFAULT_MODEL: &str = "anthropic/claude-sonnet-4";

// ── Schema generation ──────────────────────────────────────────────

/// Generate a JSON Schema `serde_json::Value` from a type that implements
/// `schemars::JsonSchema`.
///
/// # Example
///
/// ```
/// use quill::json_schema_for;
/// use quill::authoring::outline::Outline;
///
/// let schema = json_schema_for::<Outline>();
/// assert_eq!(schema["type"], "object");
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Request types ──────────────────────────────────────────────────

/// Chat completion request body. Unused optional fields are omitted from
/// serialization.
#[derive(Serialize, Debug, Default)]
pub struct ChatRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    pub messages: Vec<Message>,

    #[serde(skip_serializing_if = "is_zero_u32")]
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "is_zero_f32")]
    pub temperature: f32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}
fn is_zero_f32(v: &f32) -> bool {
    *v == 0.0
}

/// JSON output format type.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ResponseFormatType {
    #[serde(rename = "json_object")]
    JsonObject,
}

/// JSON output mode.
#[derive(Serialize, Debug)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub fmt_type: ResponseFormatType,
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// A message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

// ── Response types ─────────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
}

/// Clean return type from `OpenRouterClient::chat()`.
#[derive(Debug)]
pub struct ChatCompletion {
    pub content: Option<String>,
    pub usage: Option<UsageInfo>,
    pub finish_reason: Option<String>,
}

/// Token usage statistics.
#[derive(Deserialize, Debug, Clone)]
pub struct UsageInfo {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for the OpenRouter chat completions API.
pub struct OpenRouterClient {
    pub(crate) client: reqwest::Client,
    pub(crate) api_key: String,
    pub(crate) referer: String,
    pub(crate) title: String,
}

impl OpenRouterClient {
    /// Create a new client with the given API key and default headers.
    pub fn new(api_key: impl Into<String>) -> Result<Self, String> {
        Self::with_headers(api_key, "https://github.com/tacryt-socryp/quill", "quill")
    }

    /// Create a new client with custom Referer and X-Title headers.
    pub fn with_headers(
        api_key: impl Into<String>,
        referer: impl Into<String>,
        title: impl Into<String>,
    ) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent("quill/0.1")
            .timeout(Duration::from_secs(180))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            referer: referer.into(),
            title: title.into(),
        })
    }

    /// A POST to the completions endpoint with auth and attribution headers.
    pub(crate) fn post(&self, body: &impl Serialize) -> reqwest::RequestBuilder {
        self.client
            .post(OPENROUTER_URL)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(body)
    }

    /// Send a chat completion request.
    pub async fn chat(&self, body: &ChatRequest) -> Result<ChatCompletion, String> {
        debug!(
            "LLM request: model={}, messages={}, max_tokens={}, temp={}",
            body.model.as_deref().unwrap_or("(none)"),
            body.messages.len(),
            body.max_tokens,
            body.temperature,
        );
        let start = Instant::now();
        let resp = self
            .post(body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| format!("failed to read response: {e}"))?;
        debug!(
            "LLM response: HTTP {status} in {:.1}s ({} bytes)",
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(format!("OpenRouter API HTTP {status}: {text}"));
        }
        parse_completion(&text)
    }
}

/// Read a non-streaming response body. An API error object becomes `Err`;
/// a response without choices is an empty completion.
fn parse_completion(text: &str) -> Result<ChatCompletion, String> {
    let parsed: RawChatResponse =
        serde_json::from_str(text).map_err(|e| format!("failed to parse response: {e}"))?;
    if let Some(err) = parsed.error {
        return Err(format!("OpenRouter API error: {}", err.message));
    }
    if let Some(usage) = &parsed.usage {
        trace!(
            "Token usage: prompt={}, completion={}",
            usage.prompt_tokens.unwrap_or(0),
            usage.completion_tokens.unwrap_or(0),
        );
    }
    let choice = parsed.choices.and_then(|c| c.into_iter().next());
    Ok(ChatCompletion {
        content: choice.as_ref().and_then(|c| c.message.content.clone()),
        finish_reason: choice.and_then(|c| c.finish_reason),
        usage: parsed.usage,
    })
}
