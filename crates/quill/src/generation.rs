//! Text generation seam.
//!
//! The state machine never talks to an LLM API directly. It hands a
//! [`GenerationRequest`] to a [`TextGenerator`] and receives the fully
//! assembled text. Streaming deltas are surfaced through `on_delta` for the
//! UI only.

use crate::api::retry::{RetryConfig, retry_call};
use crate::api::router::RoutingStrategy;
use crate::api::streaming::{StreamEvent, collect_text, extract_usage};
use crate::config::AuthoringConfig;
use crate::{ChatRequest, Message, OpenRouterClient, ResponseFormat, ResponseFormatType};
use std::future::Future;
use std::pin::Pin;
use tracing::debug;

/// Why the model is being called. Drives model routing and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Purpose {
    /// Single-word intent classification (`WRITE` / `QUERY` / `OTHER`).
    Classify,
    /// Structure proposal or refinement.
    Propose,
    /// Re-express a proposal as outline JSON.
    ExtractOutline,
    /// Section body text, first draft or revision.
    WriteSection,
    /// Question answering over retrieved context.
    Answer,
    /// Short conversational reply.
    Converse,
}

impl Purpose {
    /// Short, structured calls that a cheaper model can serve.
    pub fn is_triage(self) -> bool {
        matches!(self, Purpose::Classify | Purpose::ExtractOutline)
    }

    pub fn label(self) -> &'static str {
        match self {
            Purpose::Classify => "classify",
            Purpose::Propose => "propose",
            Purpose::ExtractOutline => "extract_outline",
            Purpose::WriteSection => "write_section",
            Purpose::Answer => "answer",
            Purpose::Converse => "converse",
        }
    }
}

/// One model call.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub purpose: Purpose,
    /// System instructions.
    pub system: &'a str,
    /// Prior turns, oldest first.
    pub history: &'a [Message],
    /// The enriched user input for this call.
    pub input: &'a str,
    /// Ask for a JSON object response.
    pub json: bool,
}

impl<'a> GenerationRequest<'a> {
    pub fn new(purpose: Purpose, system: &'a str, input: &'a str) -> Self {
        Self {
            purpose,
            system,
            history: &[],
            input,
            json: false,
        }
    }

    pub fn with_history(mut self, history: &'a [Message]) -> Self {
        self.history = history;
        self
    }

    pub fn json(mut self) -> Self {
        self.json = true;
        self
    }
}

/// Boxed future returned by [`TextGenerator::generate`].
pub type GenerateFuture<'a> = Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>>;

/// Produces text for a request.
///
/// `on_delta` receives incremental fragments when the implementation
/// streams; the returned string is always the complete text.
pub trait TextGenerator: Send + Sync {
    fn generate<'a>(
        &'a self,
        request: GenerationRequest<'a>,
        on_delta: &'a (dyn Fn(&str) + Send + Sync),
    ) -> GenerateFuture<'a>;
}

// ── OpenRouter ─────────────────────────────────────────────────────

/// [`TextGenerator`] backed by the OpenRouter chat completions API.
pub struct OpenRouterGenerator {
    client: OpenRouterClient,
    routing: RoutingStrategy,
    max_tokens: u32,
    temperature: f32,
    streaming: bool,
    retry: RetryConfig,
}

impl OpenRouterGenerator {
    pub fn new(client: OpenRouterClient, config: &AuthoringConfig) -> Self {
        Self {
            client,
            routing: config.routing.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            streaming: config.streaming,
            retry: config.retry.clone(),
        }
    }

    fn build_request(&self, request: &GenerationRequest<'_>) -> ChatRequest {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(Message::system(request.system));
        messages.extend(request.history.iter().cloned());
        messages.push(Message::user(request.input));

        ChatRequest {
            model: Some(self.routing.model_for(request.purpose).to_string()),
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            response_format: request.json.then_some(ResponseFormat {
                fmt_type: ResponseFormatType::JsonObject,
            }),
        }
    }

    async fn send_once(
        &self,
        body: &ChatRequest,
        stream: bool,
        on_delta: &(dyn Fn(&str) + Send + Sync),
    ) -> Result<String, String> {
        if stream {
            let events = self
                .client
                .chat_stream_live(body, |event| {
                    if let StreamEvent::TextDelta(delta) = event {
                        on_delta(delta);
                    }
                })
                .await?;
            if let Some(usage) = extract_usage(&events) {
                debug!("Stream usage: total={}", usage.total_tokens.unwrap_or(0));
            }
            Ok(collect_text(&events))
        } else {
            let completion = self.client.chat(body).await?;
            Ok(completion.content.unwrap_or_default())
        }
    }
}

impl TextGenerator for OpenRouterGenerator {
    fn generate<'a>(
        &'a self,
        request: GenerationRequest<'a>,
        on_delta: &'a (dyn Fn(&str) + Send + Sync),
    ) -> GenerateFuture<'a> {
        Box::pin(async move {
            let body = self.build_request(&request);
            // JSON answers are parsed whole; streaming them buys nothing.
            let stream = self.streaming && !request.json;
            debug!(
                "Generating: purpose={}, model={}, stream={stream}",
                request.purpose.label(),
                body.model.as_deref().unwrap_or("(none)"),
            );

            let text = retry_call(&self.retry, request.purpose.label(), || {
                self.send_once(&body, stream, on_delta)
            })
            .await?;

            if text.trim().is_empty() {
                return Err(format!(
                    "model returned no content for {}",
                    request.purpose.label()
                ));
            }
            Ok(text)
        })
    }
}
