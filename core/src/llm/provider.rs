use std::fmt;
use std::pin::Pin;
use std::str::FromStr;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conversation::{Conversation, ToolCallRequest, ToolSpec};
use crate::ColloquyError;

/// The four backend families a conversation can be routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderId {
    OpenAi,
    Anthropic,
    Gemini,
    Ollama,
}

impl ProviderId {
    pub const ALL: [ProviderId; 4] = [
        ProviderId::OpenAi,
        ProviderId::Anthropic,
        ProviderId::Gemini,
        ProviderId::Ollama,
    ];

    /// Short label shown to users (model pickers, debate speakers)
    pub fn label(&self) -> &'static str {
        match self {
            ProviderId::OpenAi => "GPT",
            ProviderId::Anthropic => "Claude",
            ProviderId::Gemini => "Gemini",
            ProviderId::Ollama => "Ollama",
        }
    }

    /// Backend name used in error reports
    pub fn backend_name(&self) -> &'static str {
        match self {
            ProviderId::OpenAi => "OpenAI",
            ProviderId::Anthropic => "Anthropic",
            ProviderId::Gemini => "Google",
            ProviderId::Ollama => "Ollama",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ProviderId {
    type Err = ColloquyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gpt" | "openai" | "chatgpt" => Ok(ProviderId::OpenAi),
            "claude" | "anthropic" => Ok(ProviderId::Anthropic),
            "gemini" | "google" => Ok(ProviderId::Gemini),
            "ollama" | "llama" => Ok(ProviderId::Ollama),
            other => Err(ColloquyError::UnknownProvider(other.to_string())),
        }
    }
}

/// Failure of a single backend call (network, auth, malformed response)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Error from {backend}: {cause}")]
pub struct ProviderError {
    pub backend: String,
    pub cause: String,
}

impl ProviderError {
    pub fn new(backend: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            cause: cause.into(),
        }
    }
}

/// One item of a provider reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProviderResponse {
    Final { text: String },
    ToolRequested { request: ToolCallRequest },
    /// Cumulative text so far, never a delta
    StreamChunk { partial_text: String },
}

impl ProviderResponse {
    pub fn text(&self) -> Option<&str> {
        match self {
            ProviderResponse::Final { text } => Some(text),
            ProviderResponse::StreamChunk { partial_text } => Some(partial_text),
            ProviderResponse::ToolRequested { .. } => None,
        }
    }
}

/// Lazy, finite sequence of replies from one backend call
pub type ProviderStream =
    Pin<Box<dyn Stream<Item = Result<ProviderResponse, ProviderError>> + Send + 'static>>;

/// Backend-neutral request handed to an adapter
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub conversation: Conversation,
    pub tools: Vec<ToolSpec>,
    pub stream: bool,
}

impl ChatRequest {
    pub fn new(conversation: Conversation) -> Self {
        Self {
            conversation,
            tools: Vec::new(),
            stream: false,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }

    pub fn streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Tool calls and streaming are not mixed: a request exposing tools is sent single-shot
    pub fn wants_stream(&self) -> bool {
        self.stream && self.tools.is_empty()
    }
}

/// Translation layer between the common request shape and one backend
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn id(&self) -> ProviderId;

    fn backend_name(&self) -> &str {
        self.id().backend_name()
    }

    /// Issue the backend call.
    /// Streaming requests yield strictly growing `StreamChunk`s; single-shot
    /// requests yield exactly one `Final` or `ToolRequested`.
    async fn send(&self, request: ChatRequest) -> Result<ProviderStream, ProviderError>;
}

/// Wrap a single reply as a one-item stream
pub fn single(response: ProviderResponse) -> ProviderStream {
    Box::pin(futures::stream::once(async move { Ok(response) }))
}

/// Drain a reply stream into its terminal value.
/// The last `StreamChunk` becomes `Final`; an empty stream is `Final{""}`.
pub async fn collect_final(mut stream: ProviderStream) -> Result<ProviderResponse, ProviderError> {
    let mut last = None;
    while let Some(item) = stream.next().await {
        let item = item?;
        if let ProviderResponse::ToolRequested { .. } = item {
            return Ok(item);
        }
        last = Some(item);
    }
    Ok(match last {
        Some(ProviderResponse::StreamChunk { partial_text }) => ProviderResponse::Final {
            text: partial_text,
        },
        Some(other) => other,
        None => ProviderResponse::Final {
            text: String::new(),
        },
    })
}

/// Stand-in for an empty assistant reply when history is replayed.
/// Anthropic and Gemini reject empty non-final assistant content.
pub const EMPTY_REPLY_PLACEHOLDER: &str = "(no reply)";

pub(crate) fn replayed_text(content: &str) -> &str {
    if content.trim().is_empty() {
        EMPTY_REPLY_PLACEHOLDER
    } else {
        content
    }
}

/// Synthesize a call id for backends that do not assign one
pub(crate) fn new_call_id() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    static SEQ: AtomicU64 = AtomicU64::new(0);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("call_{:x}_{}", nanos, SEQ.fetch_add(1, Ordering::Relaxed))
}
