use std::sync::Arc;

use colloquy_core::{spawn_side_channel, ColloquyError, SideChannel};
use colloquy_speech::{LocalSpeechConfig, OpenAiSpeech, OpenAiSpeechConfig};
use serial_test::serial;

#[test]
#[serial]
fn missing_binaries_are_not_detected() {
    std::env::set_var("PIPER_BIN", "/nonexistent/piper");
    std::env::set_var("PIPER_VOICE", "/nonexistent/voice.onnx");
    std::env::set_var("TTS_TIMEOUT_MS", "1234");

    let cfg = LocalSpeechConfig::default();
    assert!(cfg.piper_voice.is_none());
    assert!(cfg.piper_bin.is_none());
    assert_eq!(cfg.timeout_ms, 1234);

    std::env::remove_var("PIPER_BIN");
    std::env::remove_var("PIPER_VOICE");
    std::env::remove_var("TTS_TIMEOUT_MS");
}

#[test]
#[serial]
fn openai_speech_defaults() {
    std::env::remove_var("OPENAI_TTS_MODEL");
    std::env::remove_var("OPENAI_TTS_VOICE");
    let cfg = OpenAiSpeechConfig::default();
    assert_eq!(cfg.model, "tts-1");
    assert_eq!(cfg.voice, "onyx");
    assert_eq!(cfg.player, "ffplay");
}

#[tokio::test]
async fn openai_speech_without_key_fails_in_background() {
    let speech = OpenAiSpeech::new(OpenAiSpeechConfig {
        api_key: None,
        ..OpenAiSpeechConfig::default()
    });
    let err = speech.deliver("hello".into()).await.unwrap_err();
    assert!(matches!(err, ColloquyError::Config(_)));

    // the detached task swallows the same failure
    spawn_side_channel(Arc::new(speech), "hello").await.unwrap();
}

#[test]
#[serial]
fn binaries_are_found_across_path_entries() {
    let root = std::env::temp_dir().join(format!("colloquy-path-{}", std::process::id()));
    let empty = root.join("empty");
    let bin_dir = root.join("bin");
    std::fs::create_dir_all(&empty).unwrap();
    std::fs::create_dir_all(&bin_dir).unwrap();
    std::fs::write(bin_dir.join("colloquy-test-player"), b"").unwrap();

    let saved = std::env::var_os("PATH");
    std::env::set_var("PATH", std::env::join_paths([&empty, &bin_dir]).unwrap());

    let found = colloquy_speech::get_from_path("colloquy-test-player");
    let missing = colloquy_speech::get_from_path("colloquy-no-such-player");

    match saved {
        Some(path) => std::env::set_var("PATH", path),
        None => std::env::remove_var("PATH"),
    }
    std::fs::remove_dir_all(&root).ok();

    assert_eq!(found, Some(bin_dir.join("colloquy-test-player")));
    assert!(missing.is_none());
}
