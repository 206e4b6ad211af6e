use std::fs;
use std::path::{Path, PathBuf};

use colloquy_core::orchestrator::prompts::NEWS_SYSTEM_PROMPT;
use colloquy_core::orchestrator::{DEFAULT_MAX_WORDS, DEFAULT_TURNS};
use colloquy_core::{ProviderConfig, ProviderId};
use colloquy_speech::{LocalSpeechConfig, OpenAiSpeechConfig};

/// Everything the CLI needs, resolved once at startup
#[derive(Clone, Debug)]
pub struct ColloquyConfig {
    pub openai: ProviderConfig,
    pub anthropic: ProviderConfig,
    pub gemini: ProviderConfig,
    pub ollama: ProviderConfig,
    pub debate: DebateSettings,
    pub speech: SpeechSettings,
    pub news: NewsSettings,
}

#[derive(Clone, Debug)]
pub struct DebateSettings {
    pub turns: usize,
    pub max_words: usize,
    pub agents: Vec<String>,
    pub system_prompt: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpeechEngine {
    Local,
    OpenAi,
    Off,
}

#[derive(Clone, Debug)]
pub struct SpeechSettings {
    pub engine: SpeechEngine,
    pub local: LocalSpeechConfig,
    pub openai: OpenAiSpeechConfig,
}

#[derive(Clone, Debug)]
pub struct NewsSettings {
    pub provider: String,
    pub system_prompt: String,
    pub brave_api_key: Option<String>,
    pub max_articles: usize,
}

impl Default for DebateSettings {
    fn default() -> Self {
        Self {
            turns: DEFAULT_TURNS,
            max_words: DEFAULT_MAX_WORDS,
            agents: vec!["gpt".into(), "ollama".into()],
            system_prompt: None,
        }
    }
}

impl Default for SpeechSettings {
    fn default() -> Self {
        let engine = match std::env::var("COLLOQUY_SPEECH").as_deref() {
            Ok("local") => SpeechEngine::Local,
            Ok("off") => SpeechEngine::Off,
            _ => SpeechEngine::OpenAi,
        };
        Self {
            engine,
            local: LocalSpeechConfig::default(),
            openai: OpenAiSpeechConfig::default(),
        }
    }
}

impl Default for NewsSettings {
    fn default() -> Self {
        Self {
            provider: "gpt".into(),
            system_prompt: NEWS_SYSTEM_PROMPT.into(),
            brave_api_key: std::env::var("BRAVE_API_KEY").ok().filter(|s| !s.is_empty()),
            max_articles: 4,
        }
    }
}

impl Default for ColloquyConfig {
    fn default() -> Self {
        Self {
            openai: ProviderConfig::openai(),
            anthropic: ProviderConfig::anthropic(),
            gemini: ProviderConfig::gemini(),
            ollama: ProviderConfig::ollama(),
            debate: DebateSettings::default(),
            speech: SpeechSettings::default(),
            news: NewsSettings::default(),
        }
    }
}

impl ColloquyConfig {
    /// Load configuration from a TOML file (explicit path, COLLOQUY_CONFIG, or ./colloquy.toml),
    /// overlaying values onto env-driven defaults.
    pub fn load(explicit: Option<&Path>) -> Self {
        let default = Self::default();
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("COLLOQUY_CONFIG").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("colloquy.toml"));
        if !path.exists() {
            tracing::info!(target: "colloquy", path = %path.display(), "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(&path) {
            Ok(s) => match Self::from_toml_str(&s, default.clone()) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!(target: "colloquy", error = %e, "Failed to parse TOML; using defaults");
                    default
                }
            },
            Err(e) => {
                tracing::warn!(target: "colloquy", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }

    pub fn from_toml_str(s: &str, base: Self) -> Result<Self, toml::de::Error> {
        Ok(toml::from_str::<ColloquyToml>(s)?.overlay(base))
    }

    pub fn provider(&self, id: ProviderId) -> &ProviderConfig {
        match id {
            ProviderId::OpenAi => &self.openai,
            ProviderId::Anthropic => &self.anthropic,
            ProviderId::Gemini => &self.gemini,
            ProviderId::Ollama => &self.ollama,
        }
    }

    pub fn providers(&self) -> Vec<(ProviderId, ProviderConfig)> {
        ProviderId::ALL
            .iter()
            .map(|id| (*id, self.provider(*id).clone()))
            .collect()
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct ColloquyToml {
    pub openai: Option<ProviderToml>,
    pub anthropic: Option<ProviderToml>,
    pub gemini: Option<ProviderToml>,
    pub ollama: Option<ProviderToml>,
    pub debate: Option<DebateToml>,
    pub speech: Option<SpeechToml>,
    pub news: Option<NewsToml>,
}

impl ColloquyToml {
    fn overlay(self, mut base: ColloquyConfig) -> ColloquyConfig {
        if let Some(p) = self.openai {
            p.apply(&mut base.openai);
        }
        if let Some(p) = self.anthropic {
            p.apply(&mut base.anthropic);
        }
        if let Some(p) = self.gemini {
            p.apply(&mut base.gemini);
        }
        if let Some(p) = self.ollama {
            p.apply(&mut base.ollama);
        }
        if let Some(d) = self.debate {
            d.apply(&mut base.debate);
        }
        if let Some(s) = self.speech {
            s.apply(&mut base.speech);
        }
        if let Some(n) = self.news {
            n.apply(&mut base.news);
        }
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct ProviderToml {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout_ms: Option<u64>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}
impl ProviderToml {
    fn apply(self, p: &mut ProviderConfig) {
        if let Some(x) = self.base_url {
            p.base_url = x;
        }
        if let Some(x) = self.model {
            p.model = x;
        }
        if let Some(x) = self.api_key.filter(|k| !k.is_empty()) {
            p.api_key = Some(x);
        }
        if let Some(x) = self.request_timeout_ms {
            p.request_timeout_ms = x;
        }
        if let Some(x) = self.temperature {
            p.temperature = Some(x);
        }
        if let Some(x) = self.max_tokens {
            p.max_tokens = Some(x);
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct DebateToml {
    pub turns: Option<usize>,
    pub max_words: Option<usize>,
    pub agents: Option<Vec<String>>,
    pub system_prompt: Option<String>,
}
impl DebateToml {
    fn apply(self, d: &mut DebateSettings) {
        if let Some(x) = self.turns {
            d.turns = x;
        }
        if let Some(x) = self.max_words {
            d.max_words = x;
        }
        if let Some(x) = self.agents.filter(|a| a.len() == 2) {
            d.agents = x;
        }
        if let Some(x) = self.system_prompt {
            d.system_prompt = Some(x);
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct SpeechToml {
    pub engine: Option<String>,
    pub voice: Option<String>,
    pub model: Option<String>,
    pub player: Option<String>,
    pub espeak_voice: Option<String>,
    pub piper_voice: Option<PathBuf>,
    pub rate: Option<f32>,
}
impl SpeechToml {
    fn apply(self, s: &mut SpeechSettings) {
        if let Some(x) = self.engine {
            s.engine = match x.to_ascii_lowercase().as_str() {
                "local" => SpeechEngine::Local,
                "off" | "none" => SpeechEngine::Off,
                _ => SpeechEngine::OpenAi,
            };
        }
        if let Some(x) = self.voice {
            s.openai.voice = x;
        }
        if let Some(x) = self.model {
            s.openai.model = x;
        }
        if let Some(x) = self.player {
            s.openai.player = x.clone();
            s.local.player = Some(x);
        }
        if let Some(x) = self.espeak_voice {
            s.local.espeak_voice = Some(x);
        }
        if let Some(x) = self.piper_voice.filter(|p| p.exists()) {
            s.local.piper_voice = Some(x);
        }
        if let Some(x) = self.rate {
            s.local.rate = x.clamp(0.5, 2.0);
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct NewsToml {
    pub provider: Option<String>,
    pub system_prompt: Option<String>,
    pub brave_api_key: Option<String>,
    pub max_articles: Option<usize>,
}
impl NewsToml {
    fn apply(self, n: &mut NewsSettings) {
        if let Some(x) = self.provider {
            n.provider = x;
        }
        if let Some(x) = self.system_prompt {
            n.system_prompt = x;
        }
        if let Some(x) = self.brave_api_key.filter(|k| !k.is_empty()) {
            n.brave_api_key = Some(x);
        }
        if let Some(x) = self.max_articles {
            n.max_articles = x.max(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_overlays_only_given_fields() {
        let base = ColloquyConfig::default();
        let base_url = base.openai.base_url.clone();
        let cfg = ColloquyConfig::from_toml_str(
            r#"
            [openai]
            model = "gpt-4o"

            [debate]
            turns = 4
            agents = ["claude", "gemini"]

            [speech]
            engine = "off"

            [news]
            max_articles = 0
            "#,
            base,
        )
        .unwrap();
        assert_eq!(cfg.openai.model, "gpt-4o");
        assert_eq!(cfg.openai.base_url, base_url);
        assert_eq!(cfg.debate.turns, 4);
        assert_eq!(cfg.debate.agents, vec!["claude", "gemini"]);
        assert_eq!(cfg.debate.max_words, DEFAULT_MAX_WORDS);
        assert_eq!(cfg.speech.engine, SpeechEngine::Off);
        assert_eq!(cfg.news.max_articles, 1);
    }

    #[test]
    fn debate_needs_exactly_two_agents() {
        let cfg = ColloquyConfig::from_toml_str(
            "[debate]\nagents = [\"gpt\"]\n",
            ColloquyConfig::default(),
        )
        .unwrap();
        assert_eq!(cfg.debate.agents, vec!["gpt", "ollama"]);
    }
}
