use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::provider::{ProviderError, ProviderId};

/// Per-backend client configuration, defaulted from environment variables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub request_timeout_ms: u64,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl ProviderConfig {
    /// Env-driven defaults for the given backend
    pub fn from_env(id: ProviderId) -> Self {
        match id {
            ProviderId::OpenAi => Self::openai(),
            ProviderId::Anthropic => Self::anthropic(),
            ProviderId::Gemini => Self::gemini(),
            ProviderId::Ollama => Self::ollama(),
        }
    }

    pub fn openai() -> Self {
        Self {
            base_url: env_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            model: env_or("OPENAI_MODEL", "gpt-4o-mini"),
            api_key: env_opt("OPENAI_API_KEY"),
            request_timeout_ms: request_timeout_ms(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn anthropic() -> Self {
        Self {
            base_url: env_or("ANTHROPIC_BASE_URL", "https://api.anthropic.com/v1"),
            model: env_or("ANTHROPIC_MODEL", "claude-3-haiku-20240307"),
            api_key: env_opt("ANTHROPIC_API_KEY"),
            request_timeout_ms: request_timeout_ms(),
            temperature: Some(0.7),
            max_tokens: Some(1000),
        }
    }

    pub fn gemini() -> Self {
        Self {
            base_url: env_or(
                "GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
            model: env_or("GEMINI_MODEL", "gemini-1.5-flash"),
            api_key: env_opt("GOOGLE_API_KEY").or_else(|| env_opt("GEMINI_API_KEY")),
            request_timeout_ms: request_timeout_ms(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn ollama() -> Self {
        Self {
            base_url: env_or("OLLAMA_BASE_URL", "http://localhost:11434"),
            model: env_or("OLLAMA_MODEL", "llama3.2"),
            api_key: None,
            request_timeout_ms: request_timeout_ms(),
            temperature: None,
            max_tokens: None,
        }
    }

    /// `base_url` without a trailing slash, ready for path joins
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// First `n` characters of the key, for startup diagnostics
    pub fn key_preview(&self, n: usize) -> Option<String> {
        self.api_key.as_ref().map(|k| k.chars().take(n).collect())
    }

    pub(crate) fn http_client(&self, backend: &str) -> Result<Client, ProviderError> {
        Client::builder()
            .timeout(Duration::from_millis(self.request_timeout_ms))
            .build()
            .map_err(|e| ProviderError::new(backend, format!("Failed to build HTTP client: {e}")))
    }

    pub(crate) fn require_key(&self, backend: &str) -> Result<&str, ProviderError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ProviderError::new(backend, "API key not set"))
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn request_timeout_ms() -> u64 {
    std::env::var("REQUEST_TIMEOUT_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(120_000)
}
