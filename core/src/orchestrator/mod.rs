//! Turn orchestration on top of the provider layer
//!
//! - `ChatSession`: single agent, at most one tool round trip per turn
//! - `Debate`: two agents alternating over a fixed turn budget
//! - `complete_once` / `generate_title` / `stream_reply`: one call, no loop

mod chat;
mod debate;
mod oneshot;
pub mod prompts;

pub use chat::{ChatSession, ChatSessionConfig, TurnOutcome, TurnState};
pub use debate::{
    Debate, DebateConfig, DebateEntry, DebateRole, DebateState, DEFAULT_MAX_WORDS, DEFAULT_TURNS,
};
pub use oneshot::{complete_once, generate_title, stream_reply};
