//! Streaming completion pipeline.
//!
//! [`CompletionClient`] issues one `chat/completions` request in streaming
//! mode and hands back a [`TokenStream`]. The stream is forward-only and
//! single-consumer: each call to [`TokenStream::next_fragment`] either
//! yields the next piece of assistant text, signals exhaustion, or fails.
//! [`aggregate`] drives a stream to exhaustion, forwarding every fragment
//! to a sink for live rendering while building the full text.

use std::error::Error as StdError;
use std::fmt;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use memchr::memchr;
use tracing::{debug, warn};

use crate::api::{ChatMessage, ChatRequest, ChatResponse};
use crate::core::language::Language;
use crate::core::model::ModelId;
use crate::utils::url::construct_api_url;

/// A completion request failed, either before or during streaming.
#[derive(Debug)]
pub enum CompletionError {
    /// The request could not be sent or the connection broke mid-stream.
    Transport(reqwest::Error),
    /// The endpoint answered with an error status or an in-band error
    /// payload. The message is already formatted for display.
    Api(String),
}

impl fmt::Display for CompletionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionError::Transport(source) => {
                write!(f, "completion request failed: {source}")
            }
            CompletionError::Api(message) => f.write_str(message),
        }
    }
}

impl StdError for CompletionError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            CompletionError::Transport(source) => Some(source),
            CompletionError::Api(_) => None,
        }
    }
}

/// Stateless wrapper around the remote completion endpoint.
///
/// Every call is an independent single-turn request: prior transcript
/// turns are not replayed as context.
pub struct CompletionClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl CompletionClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        CompletionClient {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue one streaming completion request for `text`.
    ///
    /// Non-default languages get the instruction prefix from
    /// [`Language::prompt`]. Transport failures and non-success statuses
    /// are returned as errors; the caller must not record an assistant
    /// turn for a failed request.
    pub async fn request(
        &self,
        model: ModelId,
        text: &str,
        language: Language,
    ) -> Result<TokenStream, CompletionError> {
        let request = ChatRequest {
            model: model.as_str().to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: language.prompt(text),
            }],
            stream: true,
        };

        debug!(model = %model, language = %language, "sending completion request");
        let response = self
            .client
            .post(construct_api_url(&self.base_url, "chat/completions"))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(CompletionError::Transport)?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(CompletionError::Api(format_api_error(&error_text)));
        }

        let inner = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(CompletionError::Transport));
        Ok(TokenStream::new(Box::pin(inner)))
    }
}

enum SseEvent {
    Fragment(String),
    Done,
}

/// Parse one `data:` payload from the SSE stream.
///
/// `[DONE]` terminates the stream. Anything that is not a chat response
/// chunk is an in-band endpoint error, except blank keep-alive payloads.
fn parse_data_payload(payload: &str) -> Result<Option<SseEvent>, CompletionError> {
    if payload == "[DONE]" {
        return Ok(Some(SseEvent::Done));
    }

    match serde_json::from_str::<ChatResponse>(payload) {
        Ok(response) => Ok(response
            .choices
            .first()
            .and_then(|choice| choice.delta.content.clone())
            .map(SseEvent::Fragment)),
        Err(_) => {
            if payload.trim().is_empty() {
                return Ok(None);
            }
            Err(CompletionError::Api(format_api_error(payload)))
        }
    }
}

/// Incremental assistant text from one in-flight completion.
///
/// Fragments come out in strict arrival order; the only buffering is the
/// line reassembly the SSE framing requires. Consuming the stream twice
/// yields nothing the second time.
pub struct TokenStream {
    inner: Pin<Box<dyn Stream<Item = Result<Bytes, CompletionError>> + Send>>,
    buffer: Vec<u8>,
    done: bool,
}

impl TokenStream {
    fn new(inner: Pin<Box<dyn Stream<Item = Result<Bytes, CompletionError>> + Send>>) -> Self {
        TokenStream {
            inner,
            buffer: Vec::new(),
            done: false,
        }
    }

    #[cfg(test)]
    pub(crate) fn from_chunks(chunks: Vec<Bytes>) -> Self {
        TokenStream::new(Box::pin(futures_util::stream::iter(
            chunks.into_iter().map(Ok),
        )))
    }

    /// Next fragment of assistant text, or `None` once the stream is
    /// exhausted. After exhaustion or an error every further call
    /// returns `Ok(None)`.
    pub async fn next_fragment(&mut self) -> Result<Option<String>, CompletionError> {
        if self.done {
            return Ok(None);
        }

        loop {
            while let Some(newline_pos) = memchr(b'\n', &self.buffer) {
                let line = match std::str::from_utf8(&self.buffer[..newline_pos]) {
                    Ok(line) => line.trim().to_string(),
                    Err(e) => {
                        warn!("invalid UTF-8 in stream: {e}");
                        self.buffer.drain(..=newline_pos);
                        continue;
                    }
                };
                self.buffer.drain(..=newline_pos);

                let Some(payload) = line.strip_prefix("data:").map(str::trim_start) else {
                    continue;
                };
                match parse_data_payload(payload) {
                    Ok(Some(SseEvent::Fragment(text))) => return Ok(Some(text)),
                    Ok(Some(SseEvent::Done)) => {
                        self.done = true;
                        return Ok(None);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        self.done = true;
                        return Err(e);
                    }
                }
            }

            match self.inner.next().await {
                Some(Ok(chunk)) => self.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    self.done = true;
                    return Err(e);
                }
                None => {
                    self.done = true;
                    return Ok(None);
                }
            }
        }
    }
}

/// Drain `stream`, handing each fragment to `sink` as it arrives and
/// returning the accumulated text on exhaustion.
///
/// An empty stream is not an error: it yields `""` with zero sink calls.
/// A mid-stream failure propagates and the partial accumulation is
/// dropped with it.
pub async fn aggregate<F>(mut stream: TokenStream, mut sink: F) -> Result<String, CompletionError>
where
    F: FnMut(&str),
{
    let mut accumulated = String::new();
    while let Some(fragment) = stream.next_fragment().await? {
        sink(&fragment);
        accumulated.push_str(&fragment);
    }
    Ok(accumulated)
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.to_string()),
                serde_json::Value::Object(map) => map
                    .get("message")
                    .and_then(|message| message.as_str().map(str::to_owned)),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| {
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        collapsed.trim().to_string()
    })
}

/// Render an endpoint error body as a one-line display message,
/// pulling out the human-readable summary when the body is the usual
/// JSON error object.
fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();

    if trimmed.is_empty() {
        return "API error: <empty response>".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(summary) = extract_error_summary(&json_value) {
            if !summary.is_empty() {
                return format!("API error: {summary}");
            }
        }
    }

    format!("API error: {trimmed}")
}
