use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use super::anthropic::AnthropicAdapter;
use super::config::ProviderConfig;
use super::gemini::GeminiAdapter;
use super::ollama::OllamaAdapter;
use super::openai::OpenAiAdapter;
use super::provider::{ProviderAdapter, ProviderError, ProviderId};
use crate::{ColloquyError, Result};

/// Construct the adapter for `id` from an explicit configuration
pub fn build_adapter(
    id: ProviderId,
    cfg: ProviderConfig,
) -> std::result::Result<Arc<dyn ProviderAdapter>, ProviderError> {
    Ok(match id {
        ProviderId::OpenAi => Arc::new(OpenAiAdapter::new(cfg)?),
        ProviderId::Anthropic => Arc::new(AnthropicAdapter::new(cfg)?),
        ProviderId::Gemini => Arc::new(GeminiAdapter::new(cfg)?),
        ProviderId::Ollama => Arc::new(OllamaAdapter::new(cfg)?),
    })
}

/// Adapters available to sessions, keyed by backend
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    adapters: HashMap<ProviderId, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every backend configured from the environment
    pub fn from_env() -> std::result::Result<Self, ProviderError> {
        Self::from_configs(
            ProviderId::ALL
                .iter()
                .map(|id| (*id, ProviderConfig::from_env(*id))),
        )
    }

    pub fn from_configs(
        configs: impl IntoIterator<Item = (ProviderId, ProviderConfig)>,
    ) -> std::result::Result<Self, ProviderError> {
        let mut registry = Self::new();
        for (id, cfg) in configs {
            debug!(target: "llm.registry", provider = %id, model = %cfg.model, base_url = %cfg.base_url, "configuring provider");
            registry.register(build_adapter(id, cfg)?);
        }
        Ok(registry)
    }

    /// Add an adapter; an existing one for the same backend is replaced and returned
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) -> Option<Arc<dyn ProviderAdapter>> {
        let id = adapter.id();
        let previous = self.adapters.insert(id, adapter);
        if previous.is_some() {
            info!(target: "llm.registry", provider = %id, "provider adapter replaced");
        }
        previous
    }

    pub fn with(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn get(&self, id: ProviderId) -> Result<Arc<dyn ProviderAdapter>> {
        self.adapters
            .get(&id)
            .cloned()
            .ok_or_else(|| ColloquyError::UnknownProvider(id.label().to_string()))
    }

    /// Look up by user-facing name such as "GPT" or "claude"
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn ProviderAdapter>> {
        self.get(name.parse()?)
    }

    pub fn contains(&self, id: ProviderId) -> bool {
        self.adapters.contains_key(&id)
    }

    /// Registered backends in canonical order
    pub fn ids(&self) -> Vec<ProviderId> {
        ProviderId::ALL
            .iter()
            .copied()
            .filter(|id| self.adapters.contains_key(id))
            .collect()
    }
}
