//! Remote document client.
//!
//! [`DocumentService`] is the seam every writer operation goes through.
//! Mutations only exist as [`DocumentService::batch_edit`], so requests that
//! target nearby offsets are always computed against one snapshot.
//! [`GoogleDocsClient`] implements it over the REST API with retry.

use super::markers::merge_ranges;
use super::model::{Document, Request, Span};
use crate::api::retry::{RetryConfig, retry_call};
use crate::config::AuthoringConfig;
use crate::error::DocsError;
use futures::future::BoxFuture;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Operations against the hosted document service.
pub trait DocumentService: Send + Sync {
    /// Create an empty document and return its id.
    fn create<'a>(&'a self, title: &'a str) -> BoxFuture<'a, Result<String, DocsError>>;

    /// Fetch the full structure of a document.
    fn fetch<'a>(&'a self, document_id: &'a str) -> BoxFuture<'a, Result<Document, DocsError>>;

    /// Apply `requests` atomically, in order. An empty batch is a no-op.
    fn batch_edit<'a>(
        &'a self,
        document_id: &'a str,
        requests: Vec<Request>,
    ) -> BoxFuture<'a, Result<(), DocsError>>;

    /// Absolute spans of `needle` in the current document.
    fn find_text<'a>(
        &'a self,
        document_id: &'a str,
        needle: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Span>, DocsError>> {
        Box::pin(async move { Ok(self.fetch(document_id).await?.find_text(needle)) })
    }

    /// Ranges under the `HEADING_1` paragraphs matching `heading`.
    fn find_heading_ranges<'a>(
        &'a self,
        document_id: &'a str,
        heading: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Span>, DocsError>> {
        Box::pin(async move { Ok(self.fetch(document_id).await?.heading_ranges(heading)) })
    }

    /// Merge `spans` and delete them in one batch, highest start first.
    fn delete_ranges<'a>(
        &'a self,
        document_id: &'a str,
        spans: Vec<Span>,
    ) -> BoxFuture<'a, Result<(), DocsError>> {
        Box::pin(async move {
            let requests = delete_requests(spans);
            self.batch_edit(document_id, requests).await
        })
    }
}

/// Delete requests for `spans`: merged, empty spans dropped, descending.
pub fn delete_requests(spans: Vec<Span>) -> Vec<Request> {
    merge_ranges(spans)
        .into_iter()
        .rev()
        .filter(|s| !s.is_empty())
        .map(Request::delete_range)
        .collect()
}

// ── Credentials ────────────────────────────────────────────────────

/// Supplies the bearer token for each request.
pub trait TokenSource: Send + Sync {
    /// A missing or empty token is reported as [`DocsError::AuthRevoked`].
    fn token(&self) -> Result<String, DocsError>;
}

/// A fixed token.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken(***)")
    }
}

impl TokenSource for StaticToken {
    fn token(&self) -> Result<String, DocsError> {
        if self.0.trim().is_empty() {
            return Err(DocsError::AuthRevoked("empty access token".into()));
        }
        Ok(self.0.clone())
    }
}

/// Reads the token from an environment variable on every request, so a
/// refreshed token is picked up without a restart.
#[derive(Debug, Clone)]
pub struct EnvToken {
    var: String,
}

impl EnvToken {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl TokenSource for EnvToken {
    fn token(&self) -> Result<String, DocsError> {
        match std::env::var(&self.var) {
            Ok(token) if !token.trim().is_empty() => Ok(token),
            _ => Err(DocsError::AuthRevoked(format!("{} is not set", self.var))),
        }
    }
}

// ── REST client ────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedDocument {
    document_id: String,
}

/// [`DocumentService`] over the Google Docs v1 REST API.
pub struct GoogleDocsClient {
    http: reqwest::Client,
    tokens: Box<dyn TokenSource>,
    base_url: String,
    retry: RetryConfig,
}

impl GoogleDocsClient {
    pub fn new(
        tokens: impl TokenSource + 'static,
        config: &AuthoringConfig,
    ) -> Result<Self, DocsError> {
        let http = reqwest::Client::builder()
            .user_agent("quill/0.1")
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| DocsError::Api(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            tokens: Box::new(tokens),
            base_url: config.docs_base_url.trim_end_matches('/').to_string(),
            retry: config.docs_retry.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// One HTTP exchange, no retry. Returns the response body.
    async fn send_once(
        &self,
        method: reqwest::Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<String, DocsError> {
        let token = self.tokens.token()?;
        let mut request = self.http.request(method.clone(), url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let start = Instant::now();
        let resp = request
            .send()
            .await
            .map_err(|e| DocsError::from_transport(&e))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| DocsError::from_transport(&e))?;
        debug!(
            "Docs {method} {url}: HTTP {status} in {:.2}s ({} bytes)",
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(DocsError::from_status(status.as_u16(), &text));
        }
        Ok(text)
    }

    async fn send(
        &self,
        label: &str,
        method: reqwest::Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<String, DocsError> {
        let url = self.url(path);
        retry_call(&self.retry, label, || {
            self.send_once(method.clone(), &url, body.as_ref())
        })
        .await
        .map_err(DocsError::exhausted)
    }
}

impl DocumentService for GoogleDocsClient {
    fn create<'a>(&'a self, title: &'a str) -> BoxFuture<'a, Result<String, DocsError>> {
        Box::pin(async move {
            let body = serde_json::json!({ "title": title });
            let text = self
                .send("docs.create", reqwest::Method::POST, "/v1/documents", Some(body))
                .await?;
            let created: CreatedDocument = serde_json::from_str(&text)
                .map_err(|e| DocsError::Api(format!("malformed create response: {e}")))?;
            debug!("Created document {}", created.document_id);
            Ok(created.document_id)
        })
    }

    fn fetch<'a>(&'a self, document_id: &'a str) -> BoxFuture<'a, Result<Document, DocsError>> {
        Box::pin(async move {
            let path = format!("/v1/documents/{document_id}");
            let text = self
                .send("docs.fetch", reqwest::Method::GET, &path, None)
                .await?;
            serde_json::from_str(&text)
                .map_err(|e| DocsError::Api(format!("malformed document: {e}")))
        })
    }

    fn batch_edit<'a>(
        &'a self,
        document_id: &'a str,
        requests: Vec<Request>,
    ) -> BoxFuture<'a, Result<(), DocsError>> {
        Box::pin(async move {
            if requests.is_empty() {
                return Ok(());
            }
            debug!("batchUpdate {document_id}: {} requests", requests.len());
            let body = serde_json::json!({ "requests": requests });
            trace!("batchUpdate body: {body}");
            let path = format!("/v1/documents/{document_id}:batchUpdate");
            self.send("docs.batch_update", reqwest::Method::POST, &path, Some(body))
                .await?;
            Ok(())
        })
    }
}
