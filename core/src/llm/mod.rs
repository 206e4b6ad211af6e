//! Provider layer: one adapter per backend behind a common async trait
//!
//! This module provides:
//! - `ProviderAdapter` and the request/response types every backend shares
//! - `ProviderConfig` env-driven client settings
//! - `OpenAiAdapter`, `AnthropicAdapter`, `GeminiAdapter`, `OllamaAdapter`
//! - `ProviderRegistry` keyed by `ProviderId`

mod anthropic;
mod config;
mod gemini;
mod ollama;
mod openai;
mod provider;
mod registry;
pub mod stream;

pub use anthropic::{build_messages_body, parse_messages_response, AnthropicAdapter};
pub use config::ProviderConfig;
pub use gemini::{build_generate_body, parse_generate_response, GeminiAdapter};
pub use ollama::OllamaAdapter;
pub use openai::{parse_chat_response, parse_tool_calls_from_chat, OpenAiAdapter};
pub use provider::{
    collect_final, single, ChatRequest, EMPTY_REPLY_PLACEHOLDER, ProviderAdapter, ProviderError, ProviderId,
    ProviderResponse, ProviderStream,
};
pub use registry::{build_adapter, ProviderRegistry};

/// Wire-shape helpers exposed for inspection and tests
pub mod wire {
    pub use super::anthropic::messages_to_anthropic;
    pub use super::gemini::contents_from;
    pub use super::ollama::{
        build_chat_body as ollama_chat_body, parse_chat_response as parse_ollama_response,
    };
    pub use super::openai::{build_chat_body as openai_chat_body, messages_to_chat};
}
