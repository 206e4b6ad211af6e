//! Wire-level stream helpers shared by the backends.
//!
//! Backends deliver text as deltas (SSE events or NDJSON lines); every adapter
//! funnels those deltas through [`cumulative`] so callers always see the full
//! text so far.

use async_stream::stream;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use reqwest::Response;
use serde_json::Value;
use tracing::trace;

use super::provider::{ProviderError, ProviderResponse, ProviderStream};

/// What a backend-specific SSE decoder made of one event
pub(crate) enum SseStep {
    Delta(String),
    Skip,
    Done,
    Fail(String),
}

/// Decode a server-sent-event body into text deltas
pub(crate) fn sse_deltas<F>(
    backend: &'static str,
    response: Response,
    mut decode: F,
) -> impl Stream<Item = Result<String, ProviderError>> + Send + 'static
where
    F: FnMut(&str, &str) -> SseStep + Send + 'static,
{
    stream! {
        let mut events = response.bytes_stream().eventsource();
        while let Some(event) = events.next().await {
            let event = match event {
                Ok(ev) => ev,
                Err(e) => {
                    yield Err(ProviderError::new(backend, format!("SSE stream error: {e}")));
                    return;
                }
            };
            trace!(target: "llm.stream", backend, event = %event.event, data = %event.data, "SSE event");
            match decode(&event.event, &event.data) {
                SseStep::Delta(text) => yield Ok(text),
                SseStep::Skip => {}
                SseStep::Done => return,
                SseStep::Fail(cause) => {
                    yield Err(ProviderError::new(backend, cause));
                    return;
                }
            }
        }
    }
}

/// Split a newline-delimited JSON body into parsed values
pub(crate) fn ndjson_values(
    backend: &'static str,
    response: Response,
) -> impl Stream<Item = Result<Value, ProviderError>> + Send + 'static {
    stream! {
        let mut bytes = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    yield Err(ProviderError::new(backend, format!("stream read failed: {e}")));
                    return;
                }
            };
            buffer.extend_from_slice(&chunk);
            while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                if let Some(parsed) = parse_line(backend, &line) {
                    yield parsed;
                }
            }
        }
        if let Some(parsed) = parse_line(backend, &buffer) {
            yield parsed;
        }
    }
}

fn parse_line(backend: &'static str, line: &[u8]) -> Option<Result<Value, ProviderError>> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    Some(
        serde_json::from_str::<Value>(line)
            .map_err(|e| ProviderError::new(backend, format!("malformed stream line: {e}"))),
    )
}

/// Turn text deltas into a strictly growing sequence of cumulative chunks.
/// Empty deltas are dropped so no two consecutive chunks are equal.
pub fn cumulative<S>(deltas: S) -> ProviderStream
where
    S: Stream<Item = Result<String, ProviderError>> + Send + 'static,
{
    Box::pin(stream! {
        let mut text = String::new();
        futures::pin_mut!(deltas);
        while let Some(delta) = deltas.next().await {
            match delta {
                Ok(delta) if delta.is_empty() => {}
                Ok(delta) => {
                    text.push_str(&delta);
                    yield Ok(ProviderResponse::StreamChunk { partial_text: text.clone() });
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }
    })
}

/// Reject non-2xx responses with status and body in the cause
pub(crate) async fn check_status(
    backend: &'static str,
    response: Response,
) -> Result<Response, ProviderError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::new(
        backend,
        format!("status={} body={}", status, body),
    ))
}

pub(crate) async fn read_json(
    backend: &'static str,
    response: Response,
) -> Result<Value, ProviderError> {
    response
        .json::<Value>()
        .await
        .map_err(|e| ProviderError::new(backend, format!("Failed to parse response JSON: {e}")))
}
