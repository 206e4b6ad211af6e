//! Local text-to-speech with graceful degradation:
//! - Prefer Piper (higher quality, requires voice model)
//! - Fallback to espeak-ng / espeak (widely available)
//! - If neither is present, log the text and succeed
//!
//! Env overrides: PIPER_BIN, PIPER_VOICE, ESPEAK_BIN, TTS_PLAYER,
//! TTS_TEMP_DIR, TTS_TIMEOUT_MS

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use colloquy_core::{ColloquyError, Result, SideChannel};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

use crate::process::{get_from_env_or_path, get_from_path, play_with, run, select_player, temp_file};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Piper,
    Espeak,
    None,
}

impl Engine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Piper => "piper",
            Engine::Espeak => "espeak-ng",
            Engine::None => "none",
        }
    }
}

#[derive(Clone, Debug)]
pub struct LocalSpeechConfig {
    pub temp_dir: PathBuf,
    pub timeout_ms: u64,
    pub sample_rate: u32,
    /// Speaking rate, 0.5–2.0
    pub rate: f32,
    pub piper_bin: Option<PathBuf>,
    pub piper_voice: Option<PathBuf>,
    pub espeak_bin: Option<PathBuf>,
    pub espeak_voice: Option<String>,
    pub player: Option<String>,
}

impl Default for LocalSpeechConfig {
    fn default() -> Self {
        let temp_dir = std::env::var("TTS_TEMP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir());
        let timeout_ms = std::env::var("TTS_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60_000);

        let piper_voice = std::env::var("PIPER_VOICE")
            .ok()
            .map(PathBuf::from)
            .filter(|p| p.exists());
        // piper is useless without a voice model
        let piper_bin = piper_voice
            .as_ref()
            .and_then(|_| get_from_env_or_path("PIPER_BIN", "piper"));
        let espeak_bin =
            get_from_env_or_path("ESPEAK_BIN", "espeak-ng").or_else(|| get_from_path("espeak"));

        Self {
            temp_dir,
            timeout_ms,
            sample_rate: 22_050,
            rate: 1.0,
            piper_bin,
            piper_voice,
            espeak_bin,
            espeak_voice: None,
            player: std::env::var("TTS_PLAYER").ok(),
        }
    }
}

impl LocalSpeechConfig {
    pub fn engine(&self) -> Engine {
        if self.piper_bin.is_some() && self.piper_voice.is_some() {
            return Engine::Piper;
        }
        if self.espeak_bin.is_some() {
            return Engine::Espeak;
        }
        Engine::None
    }
}

/// Reads replies aloud with whatever local engine is installed
pub struct LocalSpeech {
    cfg: LocalSpeechConfig,
}

impl Default for LocalSpeech {
    fn default() -> Self {
        Self::new(LocalSpeechConfig::default())
    }
}

impl LocalSpeech {
    pub fn new(cfg: LocalSpeechConfig) -> Self {
        if let Some(ref p) = cfg.piper_bin {
            info!(target: "tts", bin = ?p, "Detected Piper binary");
        }
        if let Some(ref e) = cfg.espeak_bin {
            info!(target: "tts", bin = ?e, "Detected espeak binary");
        }
        Self { cfg }
    }

    pub fn engine(&self) -> Engine {
        self.cfg.engine()
    }

    async fn speak(&self, engine: Engine, text: &str) -> Result<()> {
        let wav_path = temp_file(&self.cfg.temp_dir, "colloquy_tts", "wav");
        let synth = match engine {
            Engine::Piper => self.synth_with_piper(text, &wav_path).await,
            Engine::Espeak => self.synth_with_espeak(text, &wav_path).await,
            Engine::None => Ok(()),
        };

        let played = match synth {
            Ok(()) => match select_player(self.cfg.player.as_deref()) {
                Some(player) if wav_path.exists() => play_with(&player, &wav_path).await,
                Some(_) => {
                    warn!(target: "tts", "WAV output not found; skipping playback");
                    Ok(())
                }
                None => {
                    info!(target: "tts", "No audio player found; skipping playback");
                    Ok(())
                }
            },
            Err(e) => Err(e),
        };

        if wav_path.exists() {
            if let Err(e) = tokio::fs::remove_file(&wav_path).await {
                debug!(target: "tts", path = ?wav_path, error = %e, "Failed to remove temp WAV");
            }
        }
        played
    }

    async fn synth_with_piper(&self, text: &str, out_wav: &Path) -> Result<()> {
        let (Some(piper), Some(voice)) = (&self.cfg.piper_bin, &self.cfg.piper_voice) else {
            return Err(ColloquyError::SideChannel("Piper binary or voice not found".into()));
        };
        let mut cmd = Command::new(piper);
        cmd.args(piper_args(voice, out_wav, self.cfg.rate, self.cfg.sample_rate));
        cmd.stdin(std::process::Stdio::piped());
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());

        debug!(target: "tts", command = ?cmd, "Running piper");
        let mut child = cmd.spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).await?;
        }
        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(ColloquyError::SideChannel(format!(
                "Piper failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    async fn synth_with_espeak(&self, text: &str, out_wav: &Path) -> Result<()> {
        let espeak = self
            .cfg
            .espeak_bin
            .as_ref()
            .ok_or_else(|| ColloquyError::SideChannel("espeak-ng not found".into()))?;
        let mut cmd = Command::new(espeak);
        cmd.args(espeak_args(
            self.cfg.espeak_voice.as_deref(),
            self.cfg.rate,
            out_wav,
            text,
        ));
        debug!(target: "tts", command = ?cmd, "Running espeak-ng");
        run(cmd, "espeak-ng").await
    }
}

#[async_trait]
impl SideChannel for LocalSpeech {
    fn name(&self) -> String {
        format!("local-tts:{}", self.engine().as_str())
    }

    async fn deliver(&self, text: String) -> Result<()> {
        let engine = self.engine();
        if engine == Engine::None {
            warn!(target: "tts", "No TTS engine detected (Piper/espeak-ng missing). Printing only.");
            info!(target: "tts", text = %text, "speech");
            return Ok(());
        }
        match timeout(
            Duration::from_millis(self.cfg.timeout_ms),
            self.speak(engine, &text),
        )
        .await
        {
            Ok(res) => res,
            Err(_) => Err(ColloquyError::SideChannel(format!(
                "TTS synthesis/playback timed out after {} ms",
                self.cfg.timeout_ms
            ))),
        }
    }
}

fn piper_args(voice: &Path, out_wav: &Path, rate: f32, sample_rate: u32) -> Vec<String> {
    let length_scale = (1.0f32 / rate.clamp(0.5, 2.0)).clamp(0.5, 2.0);
    vec![
        "-m".into(),
        voice.to_string_lossy().to_string(),
        "-f".into(),
        out_wav.to_string_lossy().to_string(),
        "--length_scale".into(),
        format!("{:.2}", length_scale),
        "--sample_rate".into(),
        sample_rate.to_string(),
    ]
}

fn espeak_args(voice: Option<&str>, rate: f32, out_wav: &Path, text: &str) -> Vec<String> {
    let wpm = (160.0 * rate).round().clamp(80.0, 450.0) as i32;
    let mut args = Vec::new();
    if let Some(v) = voice.filter(|v| !v.is_empty()) {
        args.push("-v".into());
        args.push(v.to_string());
    }
    args.push("-s".into());
    args.push(wpm.to_string());
    args.push("-w".into());
    args.push(out_wav.to_string_lossy().to_string());
    args.push(text.to_string());
    args
}
