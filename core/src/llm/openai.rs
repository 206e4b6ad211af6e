use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::conversation::{Conversation, Role, ToolCallRequest, ToolSpec};

use super::config::ProviderConfig;
use super::provider::{
    single, ChatRequest, ProviderAdapter, ProviderError, ProviderId, ProviderResponse,
    ProviderStream,
};
use super::stream::{check_status, cumulative, read_json, sse_deltas, SseStep};

const BACKEND: &str = "OpenAI";

/// OpenAI-compatible Chat Completions backend
#[derive(Clone)]
pub struct OpenAiAdapter {
    http: Client,
    cfg: ProviderConfig,
}

impl OpenAiAdapter {
    pub fn new(cfg: ProviderConfig) -> Result<Self, ProviderError> {
        let http = cfg.http_client(BACKEND)?;
        Ok(Self { http, cfg })
    }

    pub fn from_env() -> Result<Self, ProviderError> {
        Self::new(ProviderConfig::openai())
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.cfg
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::OpenAi
    }

    async fn send(&self, request: ChatRequest) -> Result<ProviderStream, ProviderError> {
        let stream = request.wants_stream();
        let url = self.cfg.endpoint("chat/completions");
        let body = build_chat_body(&self.cfg, &request.conversation, &request.tools, stream);
        debug!(target: "llm.openai", %url, stream, tools = request.tools.len(), "POST via Chat Completions");

        let mut req = self
            .http
            .post(&url)
            .header("content-type", "application/json");
        if let Some(key) = &self.cfg.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.json(&body).send().await.map_err(|e| {
            ProviderError::new(BACKEND, format!("Chat Completions request failed: {e}"))
        })?;
        let resp = check_status(BACKEND, resp).await?;

        if stream {
            return Ok(cumulative(sse_deltas(BACKEND, resp, decode_sse)));
        }
        let val = read_json(BACKEND, resp).await?;
        let reply = parse_chat_response(&val).map_err(|cause| ProviderError::new(BACKEND, cause))?;
        Ok(single(reply))
    }
}

pub fn build_chat_body(
    cfg: &ProviderConfig,
    conversation: &Conversation,
    tools: &[ToolSpec],
    stream: bool,
) -> Value {
    let mut body = json!({
        "model": cfg.model,
        "messages": messages_to_chat(conversation),
        "stream": stream,
    });
    if !tools.is_empty() {
        body["tools"] = Value::Array(tools.iter().map(tool_to_chat).collect());
    }
    if let Some(t) = cfg.temperature {
        body["temperature"] = json!(t);
    }
    if let Some(m) = cfg.max_tokens {
        body["max_tokens"] = json!(m);
    }
    body
}

pub fn messages_to_chat(conversation: &Conversation) -> Vec<Value> {
    conversation
        .messages()
        .iter()
        .map(|m| match (&m.role, &m.tool_request) {
            (Role::Assistant, Some(req)) => json!({
                "role": "assistant",
                "content": Value::Null,
                "tool_calls": [{
                    "id": req.call_id,
                    "type": "function",
                    "function": {
                        "name": req.name,
                        "arguments": Value::Object(req.arguments.clone()).to_string(),
                    }
                }]
            }),
            (Role::Tool, _) => json!({
                "role": "tool",
                "content": m.content,
                "tool_call_id": m.tool_call_id,
            }),
            (role, _) => json!({"role": role.as_str(), "content": m.content}),
        })
        .collect()
}

fn tool_to_chat(tool: &ToolSpec) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

/// Map a Chat Completions body onto a single reply; the first tool call wins
pub fn parse_chat_response(v: &Value) -> Result<ProviderResponse, String> {
    let message = v
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| "Missing choices[0].message in chat completions".to_string())?;

    if let Some(request) = parse_tool_calls_from_chat(v).into_iter().next() {
        return Ok(ProviderResponse::ToolRequested { request });
    }
    let text = message
        .get("content")
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string();
    Ok(ProviderResponse::Final { text })
}

pub fn parse_tool_calls_from_chat(v: &Value) -> Vec<ToolCallRequest> {
    let mut calls = Vec::new();
    let Some(tc_arr) = v
        .get("choices")
        .and_then(|x| x.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("tool_calls"))
        .and_then(|x| x.as_array())
    else {
        return calls;
    };
    for tc in tc_arr {
        let Some(func) = tc.get("function") else {
            continue;
        };
        let name = func.get("name").and_then(|n| n.as_str()).unwrap_or("");
        if name.is_empty() {
            continue;
        }
        let id = tc
            .get("id")
            .and_then(|x| x.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(super::provider::new_call_id);
        let args = func.get("arguments").cloned().unwrap_or(Value::Null);
        calls.push(ToolCallRequest::from_raw(id, name, &args));
    }
    calls
}

fn decode_sse(_event: &str, data: &str) -> SseStep {
    if data == "[DONE]" {
        return SseStep::Done;
    }
    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return SseStep::Fail(format!("SSE parsing error: {e}, data: {data}")),
    };
    if let Some(err) = v.get("error") {
        let msg = err
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("An error occurred during streaming");
        return SseStep::Fail(msg.to_string());
    }
    match v
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(|c| c.as_str())
    {
        Some(text) => SseStep::Delta(text.to_string()),
        None => SseStep::Skip,
    }
}
