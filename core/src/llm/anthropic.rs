use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::conversation::{Conversation, Role, ToolCallRequest, ToolSpec};

use super::config::ProviderConfig;
use super::provider::{
    replayed_text, single, ChatRequest, ProviderAdapter, ProviderError, ProviderId,
    ProviderResponse, ProviderStream,
};
use super::stream::{check_status, cumulative, read_json, sse_deltas, SseStep};

const BACKEND: &str = "Anthropic";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Anthropic Messages API backend
#[derive(Clone)]
pub struct AnthropicAdapter {
    http: Client,
    cfg: ProviderConfig,
}

impl AnthropicAdapter {
    pub fn new(cfg: ProviderConfig) -> Result<Self, ProviderError> {
        let http = cfg.http_client(BACKEND)?;
        Ok(Self { http, cfg })
    }

    pub fn from_env() -> Result<Self, ProviderError> {
        Self::new(ProviderConfig::anthropic())
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.cfg
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Anthropic
    }

    async fn send(&self, request: ChatRequest) -> Result<ProviderStream, ProviderError> {
        let key = self.cfg.require_key(BACKEND)?;
        let stream = request.wants_stream();
        let url = self.cfg.endpoint("messages");
        let body = build_messages_body(&self.cfg, &request.conversation, &request.tools, stream);
        debug!(target: "llm.anthropic", %url, stream, model = %self.cfg.model, "POST messages");

        let resp = self
            .http
            .post(&url)
            .header("x-api-key", key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::new(BACKEND, format!("Messages request failed: {e}")))?;
        let resp = check_status(BACKEND, resp).await?;

        if stream {
            return Ok(cumulative(sse_deltas(BACKEND, resp, decode_sse)));
        }
        let val = read_json(BACKEND, resp).await?;
        let reply =
            parse_messages_response(&val).map_err(|cause| ProviderError::new(BACKEND, cause))?;
        Ok(single(reply))
    }
}

/// The system prompt travels in its own field, never inside `messages`
pub fn build_messages_body(
    cfg: &ProviderConfig,
    conversation: &Conversation,
    tools: &[ToolSpec],
    stream: bool,
) -> Value {
    let mut body = json!({
        "model": cfg.model,
        "max_tokens": cfg.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        "messages": messages_to_anthropic(conversation),
    });
    if let Some(system) = conversation.system_prompt() {
        body["system"] = json!(system);
    }
    if let Some(t) = cfg.temperature {
        body["temperature"] = json!(t);
    }
    if !tools.is_empty() {
        body["tools"] = Value::Array(
            tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.parameters,
                    })
                })
                .collect(),
        );
    }
    if stream {
        body["stream"] = json!(true);
    }
    body
}

pub fn messages_to_anthropic(conversation: &Conversation) -> Vec<Value> {
    conversation
        .turns()
        .iter()
        .map(|m| match (&m.role, &m.tool_request) {
            (Role::Assistant, Some(req)) => json!({
                "role": "assistant",
                "content": [{
                    "type": "tool_use",
                    "id": req.call_id,
                    "name": req.name,
                    "input": Value::Object(req.arguments.clone()),
                }]
            }),
            // tool results are user-authored content blocks
            (Role::Tool, _) => json!({
                "role": "user",
                "content": [{
                    "type": "tool_result",
                    "tool_use_id": m.tool_call_id,
                    "content": m.content,
                }]
            }),
            (Role::Assistant, None) => {
                json!({"role": "assistant", "content": replayed_text(&m.content)})
            }
            _ => json!({"role": "user", "content": m.content}),
        })
        .collect()
}

/// Text blocks are concatenated; a `tool_use` block wins over text
pub fn parse_messages_response(v: &Value) -> Result<ProviderResponse, String> {
    let blocks = v
        .get("content")
        .and_then(|c| c.as_array())
        .ok_or_else(|| "Missing content array in messages response".to_string())?;

    let mut text = String::new();
    for block in blocks {
        match block.get("type").and_then(|t| t.as_str()) {
            Some("tool_use") => {
                let name = block.get("name").and_then(|n| n.as_str()).unwrap_or("");
                let id = block
                    .get("id")
                    .and_then(|i| i.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or_else(super::provider::new_call_id);
                let input = block.get("input").cloned().unwrap_or(Value::Null);
                return Ok(ProviderResponse::ToolRequested {
                    request: ToolCallRequest::from_raw(id, name, &input),
                });
            }
            Some("text") => {
                if let Some(t) = block.get("text").and_then(|t| t.as_str()) {
                    text.push_str(t);
                }
            }
            _ => {}
        }
    }
    Ok(ProviderResponse::Final { text })
}

fn decode_sse(event: &str, data: &str) -> SseStep {
    match event {
        "message_stop" => return SseStep::Done,
        "ping" | "message_start" | "content_block_start" | "content_block_stop"
        | "message_delta" => return SseStep::Skip,
        _ => {}
    }
    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return SseStep::Fail(format!("SSE parsing error: {e}, data: {data}")),
    };
    match v.get("type").and_then(|t| t.as_str()) {
        Some("content_block_delta") => {
            let delta = v.get("delta");
            let is_text = delta
                .and_then(|d| d.get("type"))
                .and_then(|t| t.as_str())
                .map(|t| t == "text_delta")
                .unwrap_or(false);
            match delta.and_then(|d| d.get("text")).and_then(|t| t.as_str()) {
                Some(text) if is_text => SseStep::Delta(text.to_string()),
                _ => SseStep::Skip,
            }
        }
        Some("message_stop") => SseStep::Done,
        Some("error") => SseStep::Fail(
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .unwrap_or("An error occurred during streaming")
                .to_string(),
        ),
        _ => SseStep::Skip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_sse_handles_text_deltas_and_stop() {
        let data = r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#;
        assert!(matches!(decode_sse("content_block_delta", data), SseStep::Delta(t) if t == "Hi"));
        assert!(matches!(
            decode_sse("message_stop", r#"{"type":"message_stop"}"#),
            SseStep::Done
        ));
        assert!(matches!(decode_sse("ping", "{}"), SseStep::Skip));
        let err = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        assert!(matches!(decode_sse("error", err), SseStep::Fail(m) if m == "Overloaded"));
    }
}
