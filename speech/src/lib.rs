//! Speech side channels for Colloquy
//!
//! Final replies can be read aloud either by a local engine (Piper, falling
//! back to espeak-ng) or by the OpenAI speech endpoint. Both implement
//! `colloquy_core::SideChannel` and are meant to be handed to
//! `spawn_side_channel`, never awaited by a chat turn.

pub mod local;
pub mod openai;
mod process;

pub use local::{LocalSpeech, LocalSpeechConfig};
pub use openai::{OpenAiSpeech, OpenAiSpeechConfig};
pub use process::{get_from_path, select_player};
