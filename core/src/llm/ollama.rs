use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::conversation::{Conversation, Role, ToolCallRequest, ToolSpec};

use super::config::ProviderConfig;
use super::provider::{
    new_call_id, single, ChatRequest, ProviderAdapter, ProviderError, ProviderId,
    ProviderResponse, ProviderStream,
};
use super::stream::{check_status, cumulative, ndjson_values, read_json};

const BACKEND: &str = "Ollama";

/// Local Ollama server speaking `/api/chat`
#[derive(Clone)]
pub struct OllamaAdapter {
    http: Client,
    cfg: ProviderConfig,
}

impl OllamaAdapter {
    pub fn new(cfg: ProviderConfig) -> Result<Self, ProviderError> {
        let http = cfg.http_client(BACKEND)?;
        Ok(Self { http, cfg })
    }

    pub fn from_env() -> Result<Self, ProviderError> {
        Self::new(ProviderConfig::ollama())
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.cfg
    }
}

#[async_trait]
impl ProviderAdapter for OllamaAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Ollama
    }

    async fn send(&self, request: ChatRequest) -> Result<ProviderStream, ProviderError> {
        let stream = request.wants_stream();
        let url = self.cfg.endpoint("api/chat");
        let body = build_chat_body(&self.cfg, &request.conversation, &request.tools, stream);
        debug!(target: "llm.ollama", %url, stream, model = %self.cfg.model, "POST api/chat");

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::new(BACKEND, format!("Ollama request failed: {e}")))?;
        let resp = check_status(BACKEND, resp).await?;

        if stream {
            let values = ndjson_values(BACKEND, resp);
            let deltas = stream! {
                futures::pin_mut!(values);
                while let Some(value) = values.next().await {
                    let value = match value {
                        Ok(v) => v,
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    };
                    match decode_line(&value) {
                        Ok((delta, done)) => {
                            yield Ok(delta);
                            if done {
                                return;
                            }
                        }
                        Err(cause) => {
                            yield Err(ProviderError::new(BACKEND, cause));
                            return;
                        }
                    }
                }
            };
            return Ok(cumulative(deltas));
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
    let messages: Vec<Value> = conversation
        .messages()
        .iter()
        .map(|m| match (&m.role, &m.tool_request) {
            (Role::Assistant, Some(req)) => json!({
                "role": "assistant",
                "content": "",
                "tool_calls": [{ "function": {
                    "name": req.name,
                    "arguments": Value::Object(req.arguments.clone()),
                }}]
            }),
            (role, _) => json!({ "role": role.as_str(), "content": m.content }),
        })
        .collect();

    let mut body = json!({
        "model": cfg.model,
        "messages": messages,
        "stream": stream,
    });
    if !tools.is_empty() {
        body["tools"] = Value::Array(
            tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect(),
        );
    }
    if let Some(t) = cfg.temperature {
        body["options"] = json!({ "temperature": t });
    }
    body
}

pub fn parse_chat_response(v: &Value) -> Result<ProviderResponse, String> {
    if let Some(err) = v.get("error").and_then(|e| e.as_str()) {
        return Err(err.to_string());
    }
    let message = v
        .get("message")
        .ok_or_else(|| "Missing message in chat response".to_string())?;

    let first_call = message
        .get("tool_calls")
        .and_then(|t| t.as_array())
        .and_then(|calls| calls.iter().find_map(|c| c.get("function")));
    if let Some(func) = first_call {
        let name = func.get("name").and_then(|n| n.as_str()).unwrap_or("");
        let args = func.get("arguments").cloned().unwrap_or(Value::Null);
        return Ok(ProviderResponse::ToolRequested {
            request: ToolCallRequest::from_raw(new_call_id(), name, &args),
        });
    }
    let text = message
        .get("content")
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string();
    Ok(ProviderResponse::Final { text })
}

/// One NDJSON line: the text delta and whether the server marked it last
fn decode_line(v: &Value) -> Result<(String, bool), String> {
    if let Some(err) = v.get("error").and_then(|e| e.as_str()) {
        return Err(err.to_string());
    }
    let delta = v
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string();
    let done = v.get("done").and_then(|d| d.as_bool()).unwrap_or(false);
    Ok((delta, done))
}
