use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::conversation::{Conversation, Message, Role, ToolCallRequest, ToolSpec};

use super::config::ProviderConfig;
use super::provider::{
    new_call_id, replayed_text, single, ChatRequest, ProviderAdapter, ProviderError, ProviderId,
    ProviderResponse, ProviderStream,
};
use super::stream::{check_status, cumulative, read_json, sse_deltas, SseStep};

const BACKEND: &str = "Google";

/// Gemini generateContent backend
#[derive(Clone)]
pub struct GeminiAdapter {
    http: Client,
    cfg: ProviderConfig,
}

impl GeminiAdapter {
    pub fn new(cfg: ProviderConfig) -> Result<Self, ProviderError> {
        let http = cfg.http_client(BACKEND)?;
        Ok(Self { http, cfg })
    }

    pub fn from_env() -> Result<Self, ProviderError> {
        Self::new(ProviderConfig::gemini())
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.cfg
    }
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Gemini
    }

    async fn send(&self, request: ChatRequest) -> Result<ProviderStream, ProviderError> {
        let key = self.cfg.require_key(BACKEND)?;
        let stream = request.wants_stream();
        let url = if stream {
            self.cfg.endpoint(&format!(
                "models/{}:streamGenerateContent?alt=sse",
                self.cfg.model
            ))
        } else {
            self.cfg
                .endpoint(&format!("models/{}:generateContent", self.cfg.model))
        };
        let body = build_generate_body(&self.cfg, &request.conversation, &request.tools);
        debug!(target: "llm.gemini", %url, stream, "POST generate content");

        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::new(BACKEND, format!("generateContent request failed: {e}")))?;
        let resp = check_status(BACKEND, resp).await?;

        if stream {
            return Ok(cumulative(sse_deltas(BACKEND, resp, decode_sse)));
        }
        let val = read_json(BACKEND, resp).await?;
        let reply =
            parse_generate_response(&val).map_err(|cause| ProviderError::new(BACKEND, cause))?;
        Ok(single(reply))
    }
}

pub fn build_generate_body(
    cfg: &ProviderConfig,
    conversation: &Conversation,
    tools: &[ToolSpec],
) -> Value {
    let mut body = json!({ "contents": contents_from(conversation) });
    if let Some(system) = conversation.system_prompt() {
        body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
    }
    if !tools.is_empty() {
        let decls: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                })
            })
            .collect();
        body["tools"] = json!([{ "functionDeclarations": decls }]);
    }
    let mut generation = serde_json::Map::new();
    if let Some(t) = cfg.temperature {
        generation.insert("temperature".into(), json!(t));
    }
    if let Some(m) = cfg.max_tokens {
        generation.insert("maxOutputTokens".into(), json!(m));
    }
    if !generation.is_empty() {
        body["generationConfig"] = Value::Object(generation);
    }
    body
}

/// Gemini knows only `user` and `model`; function responses are keyed by name
pub fn contents_from(conversation: &Conversation) -> Vec<Value> {
    let turns = conversation.turns();
    let mut out = Vec::with_capacity(turns.len());
    let mut previous: Option<&Message> = None;
    for m in turns {
        let entry = match (&m.role, &m.tool_request) {
            (Role::Assistant, Some(req)) => json!({
                "role": "model",
                "parts": [{ "functionCall": {
                    "name": req.name,
                    "args": Value::Object(req.arguments.clone()),
                }}]
            }),
            (Role::Assistant, None) => json!({
                "role": "model",
                "parts": [{ "text": replayed_text(&m.content) }]
            }),
            (Role::Tool, _) => {
                let name = previous
                    .and_then(|p| p.tool_request.as_ref())
                    .map(|r| r.name.as_str())
                    .unwrap_or_default();
                json!({
                    "role": "user",
                    "parts": [{ "functionResponse": {
                        "name": name,
                        "response": { "content": m.content },
                    }}]
                })
            }
            _ => json!({ "role": "user", "parts": [{ "text": m.content }] }),
        };
        out.push(entry);
        previous = Some(m);
    }
    out
}

pub fn parse_generate_response(v: &Value) -> Result<ProviderResponse, String> {
    let Some(candidate) = v.get("candidates").and_then(|c| c.get(0)) else {
        // blocked prompts come back without candidates
        if v.get("promptFeedback").is_some() {
            return Ok(ProviderResponse::Final {
                text: String::new(),
            });
        }
        return Err("Missing candidates in generateContent response".to_string());
    };
    let parts = candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .cloned()
        .unwrap_or_default();

    if let Some(call) = parts.iter().find_map(|p| p.get("functionCall")) {
        let name = call.get("name").and_then(|n| n.as_str()).unwrap_or("");
        let args = call.get("args").cloned().unwrap_or(Value::Null);
        return Ok(ProviderResponse::ToolRequested {
            request: ToolCallRequest::from_raw(new_call_id(), name, &args),
        });
    }
    Ok(ProviderResponse::Final {
        text: parts_text(&parts),
    })
}

fn parts_text(parts: &[Value]) -> String {
    parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect()
}

fn decode_sse(_event: &str, data: &str) -> SseStep {
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
    let parts = v
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array());
    match parts {
        Some(parts) => SseStep::Delta(parts_text(parts)),
        None => SseStep::Skip,
    }
}
