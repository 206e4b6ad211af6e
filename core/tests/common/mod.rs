#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use colloquy_core::llm::{ChatRequest, ProviderStream};
use colloquy_core::{ProviderAdapter, ProviderError, ProviderId, ProviderResponse, ToolCallRequest};
use serde_json::json;

type Script = dyn Fn(&ChatRequest, usize) -> Result<Vec<ProviderResponse>, ProviderError>
    + Send
    + Sync;

/// Deterministic adapter driven by a closure over (request, call index)
pub struct StubAdapter {
    id: ProviderId,
    script: Box<Script>,
    calls: AtomicUsize,
    requests: Mutex<Vec<ChatRequest>>,
}

impl StubAdapter {
    pub fn new<F>(id: ProviderId, script: F) -> Arc<Self>
    where
        F: Fn(&ChatRequest, usize) -> Result<Vec<ProviderResponse>, ProviderError>
            + Send
            + Sync
            + 'static,
    {
        Arc::new(Self {
            id,
            script: Box::new(script),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Always answers with the same text
    pub fn replying(id: ProviderId, text: &str) -> Arc<Self> {
        let text = text.to_string();
        Self::new(id, move |_, _| Ok(vec![final_text(&text)]))
    }

    /// Always asks for `tool`, whatever it is sent
    pub fn always_tool(id: ProviderId, tool: &str) -> Arc<Self> {
        let tool = tool.to_string();
        Self::new(id, move |_, n| {
            Ok(vec![ProviderResponse::ToolRequested {
                request: tool_call(&format!("call_{n}"), &tool),
            }])
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderAdapter for StubAdapter {
    fn id(&self) -> ProviderId {
        self.id
    }

    async fn send(&self, request: ChatRequest) -> Result<ProviderStream, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let items = (self.script)(&request, n);
        self.requests.lock().unwrap().push(request);
        let items = items?;
        Ok(Box::pin(futures::stream::iter(items.into_iter().map(Ok))))
    }
}

pub fn final_text(text: &str) -> ProviderResponse {
    ProviderResponse::Final {
        text: text.to_string(),
    }
}

pub fn chunk(text: &str) -> ProviderResponse {
    ProviderResponse::StreamChunk {
        partial_text: text.to_string(),
    }
}

pub fn tool_call(call_id: &str, name: &str) -> ToolCallRequest {
    ToolCallRequest::from_raw(call_id, name, &json!({"topic": "Rust"}))
}

/// Ready-made stream of cumulative chunks
pub fn chunk_stream(texts: &[&str]) -> ProviderStream {
    let items: Vec<Result<ProviderResponse, ProviderError>> =
        texts.iter().map(|t| Ok(chunk(t))).collect();
    Box::pin(futures::stream::iter(items))
}
