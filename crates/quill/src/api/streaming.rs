//! Server-Sent Events (SSE) streaming for the chat completions API.
//!
//! Provides [`StreamEvent`] and [`OpenRouterClient::chat_stream_live`] for
//! receiving incremental text deltas. Deltas only feed the UI; callers act
//! on the assembled text from [`collect_text`].

use crate::{ChatRequest, OpenRouterClient, UsageInfo};
use serde::Deserialize;
use tracing::{debug, trace, warn};

/// A single event from an SSE stream.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// An incremental text content delta.
    TextDelta(String),
    /// Token usage information (sent in the final chunk).
    Usage(UsageInfo),
    /// The stream is complete.
    Done,
}

/// Raw SSE data chunk.
#[derive(Deserialize, Debug)]
struct StreamChunk {
    choices: Option<Vec<StreamChoice>>,
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct StreamChoice {
    delta: Option<StreamDelta>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct StreamDelta {
    content: Option<String>,
}

impl OpenRouterClient {
    /// Send a streaming chat request, invoking `on_event` for each event as
    /// it arrives off the wire. The full event list is also returned.
    pub async fn chat_stream_live(
        &self,
        body: &ChatRequest,
        mut on_event: impl FnMut(&StreamEvent),
    ) -> Result<Vec<StreamEvent>, String> {
        let mut stream_body =
            serde_json::to_value(body).map_err(|e| format!("failed to serialize request: {e}"))?;
        stream_body["stream"] = serde_json::Value::Bool(true);

        debug!("Sending live streaming chat request");

        let mut resp = self
            .post(&stream_body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(format!("OpenRouter API HTTP {status}: {text}"));
        }

        let mut decoder = SseDecoder::default();
        let mut events = Vec::new();
        let mut emit = |payloads: Vec<String>, events: &mut Vec<StreamEvent>| {
            for data in payloads {
                let before = events.len();
                parse_sse_data(&data, events);
                for ev in events.iter().skip(before) {
                    on_event(ev);
                }
            }
        };

        while !decoder.is_done()
            && let Some(chunk) = resp
                .chunk()
                .await
                .map_err(|e| format!("failed to read streaming chunk: {e}"))?
        {
            emit(decoder.push(&chunk), &mut events);
        }
        emit(decoder.finish(), &mut events);

        let done = StreamEvent::Done;
        on_event(&done);
        events.push(done);

        debug!("Stream completed with {} events", events.len());
        Ok(events)
    }
}

/// Splits an SSE byte stream into `data:` payloads.
///
/// Bytes are buffered until a full line arrives, so a payload split across
/// network chunks (or a multi-byte character split across them) is only
/// decoded once complete. Comments and blank lines are dropped; the
/// `[DONE]` sentinel ends the stream.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    /// Feed a chunk; returns the payloads of every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        if self.done {
            return Vec::new();
        }
        self.buffer.extend_from_slice(chunk);
        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(data) = self.accept(&String::from_utf8_lossy(&line)) {
                payloads.push(data);
            }
            if self.done {
                self.buffer.clear();
                break;
            }
        }
        payloads
    }

    /// Flush a final line that had no trailing newline.
    pub fn finish(&mut self) -> Vec<String> {
        let rest = std::mem::take(&mut self.buffer);
        if self.done || rest.is_empty() {
            return Vec::new();
        }
        self.accept(&String::from_utf8_lossy(&rest))
            .into_iter()
            .collect()
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    fn accept(&mut self, line: &str) -> Option<String> {
        let data = line.trim().strip_prefix("data:")?.trim_start();
        if data == "[DONE]" {
            self.done = true;
            return None;
        }
        (!data.is_empty()).then(|| data.to_string())
    }
}

/// Parse a single SSE `data:` payload into stream events.
fn parse_sse_data(data: &str, events: &mut Vec<StreamEvent>) {
    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => {
            if let Some(usage) = chunk.usage {
                events.push(StreamEvent::Usage(usage));
            }
            for choice in chunk.choices.unwrap_or_default() {
                if let Some(content) = choice.delta.and_then(|d| d.content)
                    && !content.is_empty()
                {
                    events.push(StreamEvent::TextDelta(content));
                }
                if choice.finish_reason.is_some() {
                    trace!("Stream finish_reason: {:?}", choice.finish_reason);
                }
            }
        }
        Err(e) => {
            warn!("Failed to parse SSE chunk: {e} (data: {data})");
        }
    }
}

/// Assemble a complete text string from a sequence of stream events.
pub fn collect_text(events: &[StreamEvent]) -> String {
    let mut text = String::new();
    for event in events {
        if let StreamEvent::TextDelta(delta) = event {
            text.push_str(delta);
        }
    }
    text
}

/// Extract usage info from stream events (if present).
pub fn extract_usage(events: &[StreamEvent]) -> Option<UsageInfo> {
    events.iter().rev().find_map(|event| match event {
        StreamEvent::Usage(usage) => Some(usage.clone()),
        _ => None,
    })
}
