use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use colloquy_core::{ColloquyError, Result, SideChannel};
use serde_json::json;
use tracing::{debug, info};

use crate::process::{get_from_path, play_with, temp_file};

/// OpenAI `/audio/speech` settings
#[derive(Clone, Debug)]
pub struct OpenAiSpeechConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub voice: String,
    pub player: String,
    pub temp_dir: PathBuf,
    pub request_timeout_ms: u64,
}

impl Default for OpenAiSpeechConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            api_key: std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            model: std::env::var("OPENAI_TTS_MODEL").unwrap_or_else(|_| "tts-1".to_string()),
            voice: std::env::var("OPENAI_TTS_VOICE").unwrap_or_else(|_| "onyx".to_string()),
            player: "ffplay".to_string(),
            temp_dir: std::env::temp_dir(),
            request_timeout_ms: 60_000,
        }
    }
}

impl OpenAiSpeechConfig {
    pub fn endpoint(&self) -> String {
        format!("{}/audio/speech", self.base_url.trim_end_matches('/'))
    }

    pub fn request_body(&self, text: &str) -> serde_json::Value {
        json!({
            "model": self.model,
            "voice": self.voice,
            "input": text,
        })
    }
}

/// Synthesizes with OpenAI and plays the MP3 locally
pub struct OpenAiSpeech {
    cfg: OpenAiSpeechConfig,
    http: reqwest::Client,
}

impl Default for OpenAiSpeech {
    fn default() -> Self {
        Self::new(OpenAiSpeechConfig::default())
    }
}

impl OpenAiSpeech {
    pub fn new(cfg: OpenAiSpeechConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { cfg, http }
    }

    pub fn config(&self) -> &OpenAiSpeechConfig {
        &self.cfg
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let key = self
            .cfg
            .api_key
            .as_deref()
            .ok_or_else(|| ColloquyError::Config("OPENAI_API_KEY not set for speech".into()))?;
        let url = self.cfg.endpoint();
        debug!(target: "tts", %url, model = %self.cfg.model, voice = %self.cfg.voice, "POST audio/speech");

        let resp = self
            .http
            .post(&url)
            .bearer_auth(key)
            .json(&self.cfg.request_body(text))
            .send()
            .await
            .map_err(|e| ColloquyError::SideChannel(format!("speech request failed: {e}")))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ColloquyError::SideChannel(format!(
                "speech API error: status={} body={}",
                status, body
            )));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ColloquyError::SideChannel(format!("speech body read failed: {e}")))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl SideChannel for OpenAiSpeech {
    fn name(&self) -> String {
        format!("openai-tts:{}", self.cfg.voice)
    }

    async fn deliver(&self, text: String) -> Result<()> {
        let audio = self.synthesize(&text).await?;
        let Some(player) = get_from_path(&self.cfg.player) else {
            info!(target: "tts", player = %self.cfg.player, bytes = audio.len(), "No audio player found; dropping speech");
            return Ok(());
        };

        let path = temp_file(&self.cfg.temp_dir, "colloquy_speech", "mp3");
        tokio::fs::write(&path, &audio).await?;
        let played = play_with(&player, &path).await;
        if let Err(e) = tokio::fs::remove_file(&path).await {
            debug!(target: "tts", path = ?path, error = %e, "Failed to remove temp MP3");
        }
        played
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_configured_voice() {
        let cfg = OpenAiSpeechConfig {
            base_url: "http://localhost:9/v1/".into(),
            api_key: None,
            model: "tts-1".into(),
            voice: "onyx".into(),
            player: "ffplay".into(),
            temp_dir: std::env::temp_dir(),
            request_timeout_ms: 100,
        };
        assert_eq!(cfg.endpoint(), "http://localhost:9/v1/audio/speech");
        let body = cfg.request_body("hello");
        assert_eq!(body["model"], "tts-1");
        assert_eq!(body["voice"], "onyx");
        assert_eq!(body["input"], "hello");
    }
}
