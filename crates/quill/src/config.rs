//! Authoring configuration.
//!
//! [`AuthoringConfig`] carries every knob the generator, the document
//! client and the state machine read. Construct it with
//! [`AuthoringConfig::new`] and chain `with_*` builders.

use crate::api::retry::RetryConfig;
use crate::api::router::RoutingStrategy;
use crate::authoring::policy::PhrasePolicy;
use crate::docs::formatter::FormatStyle;

/// Default base URL of the document REST API.
pub const DEFAULT_DOCS_BASE_URL: &str = "https://docs.googleapis.com";

/// Configuration for an authoring session.
#[derive(Debug, Clone)]
pub struct AuthoringConfig {
    /// Model routing strategy. `new` sets it to a single model.
    pub routing: RoutingStrategy,
    /// Maximum tokens per LLM response.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Whether to stream LLM responses (emits text-delta events).
    pub streaming: bool,
    /// Retry configuration for transient LLM API failures.
    pub retry: RetryConfig,
    /// Retry configuration for the document service.
    pub docs_retry: RetryConfig,
    /// Formatting preset for headings, paragraphs and margins.
    pub style: FormatStyle,
    /// Document title used when an outline carries none.
    pub default_title: String,
    /// Remove markers once the last section is approved.
    pub finalize_on_completion: bool,
    /// Number of prior turns kept in the session history.
    pub max_history_messages: usize,
    /// Where the user should go to grant document access again.
    pub reauthorize_url: Option<String>,
    /// Base URL of the document REST API.
    pub docs_base_url: String,
    /// Phrase lists for approval, negation and conversational filtering.
    pub phrases: PhrasePolicy,
}

impl Default for AuthoringConfig {
    fn default() -> Self {
        Self {
            routing: RoutingStrategy::default(),
            max_tokens: 4096,
            temperature: 0.3,
            streaming: false,
            retry: RetryConfig::with_retries(2),
            docs_retry: RetryConfig::document_service(),
            style: FormatStyle::Abnt,
            default_title: "Untitled Report".to_string(),
            finalize_on_completion: true,
            max_history_messages: 20,
            reauthorize_url: None,
            docs_base_url: DEFAULT_DOCS_BASE_URL.to_string(),
            phrases: PhrasePolicy::default(),
        }
    }
}

impl AuthoringConfig {
    /// Create a config that sends every call to `model`.
    ///
    /// ```ignore
    /// let config = AuthoringConfig::new("anthropic/claude-sonnet-4")
    ///     .with_style(FormatStyle::Apa)
    ///     .with_finalize_on_completion(false);
    /// ```
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            routing: RoutingStrategy::Single(model.into()),
            ..Default::default()
        }
    }

    // ── Builder methods ───────────────────────────────────────────

    /// Route triage calls (intent classification, outline extraction) to a
    /// cheaper model.
    pub fn with_triage_model(mut self, triage_model: impl Into<String>) -> Self {
        let writing_model = self
            .routing
            .model_for(crate::generation::Purpose::WriteSection)
            .to_string();
        self.routing = RoutingStrategy::CheapTriage {
            triage_model: triage_model.into(),
            writing_model,
        };
        self
    }

    pub fn with_routing(mut self, routing: RoutingStrategy) -> Self {
        self.routing = routing;
        self
    }

    /// Set the maximum tokens per LLM response.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Enable or disable streaming for LLM API calls.
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Number of retries for transient LLM API failures (429, 5xx,
    /// network errors). Pass `0` to disable.
    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.retry = RetryConfig::with_retries(max_retries);
        self
    }

    pub fn with_docs_retry(mut self, retry: RetryConfig) -> Self {
        self.docs_retry = retry;
        self
    }

    pub fn with_style(mut self, style: FormatStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_default_title(mut self, title: impl Into<String>) -> Self {
        self.default_title = title.into();
        self
    }

    /// Whether to strip markers after the last section is approved.
    pub fn with_finalize_on_completion(mut self, finalize: bool) -> Self {
        self.finalize_on_completion = finalize;
        self
    }

    pub fn with_max_history_messages(mut self, max: usize) -> Self {
        self.max_history_messages = max;
        self
    }

    /// URL included in the reply when document access has been revoked.
    pub fn with_reauthorize_url(mut self, url: impl Into<String>) -> Self {
        self.reauthorize_url = Some(url.into());
        self
    }

    pub fn with_docs_base_url(mut self, url: impl Into<String>) -> Self {
        self.docs_base_url = url.into();
        self
    }

    /// Replace the phrase policy (approval, negation, conversational and
    /// revision lists).
    pub fn with_phrases(mut self, phrases: PhrasePolicy) -> Self {
        self.phrases = phrases;
        self
    }
}
