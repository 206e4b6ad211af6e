use std::path::{Path, PathBuf};

use colloquy_core::{ColloquyError, Result};
use tokio::process::Command;
use tracing::debug;

pub(crate) fn get_from_env_or_path(env_key: &str, default_bin: &str) -> Option<PathBuf> {
    if let Ok(p) = std::env::var(env_key) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Some(pb);
        }
    }
    get_from_path(default_bin)
}

/// Resolve a binary name against `PATH`; paths are checked as given
pub fn get_from_path(bin: &str) -> Option<PathBuf> {
    if bin.contains(std::path::MAIN_SEPARATOR) {
        let p = PathBuf::from(bin);
        return if p.exists() { Some(p) } else { None };
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(bin))
        .find(|candidate| candidate.exists())
}

/// First available player, honoring a preference when it is installed
pub fn select_player(pref: Option<&str>) -> Option<PathBuf> {
    pref.and_then(get_from_path)
        .or_else(|| get_from_path("aplay"))
        .or_else(|| get_from_path("paplay"))
        .or_else(|| get_from_path("ffplay"))
}

pub(crate) fn player_args(player_bin: &Path, audio: &Path) -> Vec<String> {
    let name = player_bin
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("");
    let audio = audio.to_string_lossy().to_string();
    match name {
        "ffplay" => vec![
            "-nodisp".into(),
            "-autoexit".into(),
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            audio,
        ],
        _ => vec![audio],
    }
}

pub(crate) async fn play_with(player_bin: &Path, audio: &Path) -> Result<()> {
    let mut cmd = Command::new(player_bin);
    cmd.args(player_args(player_bin, audio));
    debug!(target: "tts", command = ?cmd, "Playing audio");
    run(cmd, "player").await
}

/// Run to completion; a non-zero exit becomes an error carrying stderr
pub(crate) async fn run(mut cmd: Command, what: &str) -> Result<()> {
    let output = cmd.output().await?;
    if !output.status.success() {
        return Err(ColloquyError::SideChannel(format!(
            "{} failed: {}",
            what,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(())
}

pub(crate) fn temp_file(dir: &Path, prefix: &str, ext: &str) -> PathBuf {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    static SEQ: AtomicU64 = AtomicU64::new(0);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    dir.join(format!(
        "{prefix}_{}_{:x}_{}.{ext}",
        std::process::id(),
        nanos,
        SEQ.fetch_add(1, Ordering::Relaxed)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ffplay_gets_headless_flags() {
        let args = player_args(Path::new("/usr/bin/ffplay"), Path::new("/tmp/a.mp3"));
        assert_eq!(args[..3], ["-nodisp", "-autoexit", "-hide_banner"]);
        assert_eq!(args.last().map(String::as_str), Some("/tmp/a.mp3"));

        let args = player_args(Path::new("/usr/bin/aplay"), Path::new("/tmp/a.wav"));
        assert_eq!(args, vec!["/tmp/a.wav".to_string()]);
    }

    #[test]
    fn temp_files_are_unique() {
        let dir = std::env::temp_dir();
        assert_ne!(temp_file(&dir, "tts", "wav"), temp_file(&dir, "tts", "wav"));
    }
}
