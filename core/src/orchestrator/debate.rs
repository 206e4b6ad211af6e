//! Two-agent debate: a fixed number of turns alternating defender and challenger.
//!
//! Roles are bound once, when the debate is created, by shuffling the two
//! agents with a caller-supplied random source. A provider failure becomes a
//! transcript entry and the debate carries on.

use std::fmt;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::prompts::{debate_system_prompt, debate_turn_prompt};
use crate::conversation::Conversation;
use crate::llm::{
    collect_final, ChatRequest, ProviderAdapter, ProviderError, ProviderId, ProviderRegistry,
    ProviderResponse,
};
use crate::Result;

pub const DEFAULT_TURNS: usize = 8;
pub const DEFAULT_MAX_WORDS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DebateRole {
    Defender,
    Challenger,
}

impl DebateRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            DebateRole::Defender => "Defender",
            DebateRole::Challenger => "Challenger",
        }
    }

    pub fn opponent(&self) -> DebateRole {
        match self {
            DebateRole::Defender => DebateRole::Challenger,
            DebateRole::Challenger => DebateRole::Defender,
        }
    }

    /// The defender always opens
    pub fn for_turn(turn: usize) -> DebateRole {
        if turn % 2 == 0 {
            DebateRole::Defender
        } else {
            DebateRole::Challenger
        }
    }
}

impl fmt::Display for DebateRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateConfig {
    pub topic: String,
    pub turns: usize,
    /// Overrides the built-in debate club prompt
    pub system_prompt: Option<String>,
    pub max_words: usize,
}

impl DebateConfig {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            turns: DEFAULT_TURNS,
            system_prompt: None,
            max_words: DEFAULT_MAX_WORDS,
        }
    }

    pub fn with_turns(mut self, turns: usize) -> Self {
        self.turns = turns;
        self
    }

    pub fn system_prompt(&self) -> String {
        self.system_prompt
            .clone()
            .unwrap_or_else(|| debate_system_prompt(self.max_words))
    }
}

/// One line of the transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebateEntry {
    pub speaker: ProviderId,
    pub role: DebateRole,
    /// What the opponent said last; empty on the opening turn
    pub input: String,
    pub text: String,
    pub failed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateState {
    pub topic: String,
    pub defender: ProviderId,
    pub challenger: ProviderId,
    pub turn_budget: usize,
    transcript: Vec<DebateEntry>,
}

impl DebateState {
    fn new(topic: String, defender: ProviderId, challenger: ProviderId, turn_budget: usize) -> Self {
        Self {
            topic,
            defender,
            challenger,
            turn_budget,
            transcript: Vec::with_capacity(turn_budget),
        }
    }

    pub fn transcript(&self) -> &[DebateEntry] {
        &self.transcript
    }

    pub fn turn_count(&self) -> usize {
        self.transcript.len()
    }

    pub fn is_complete(&self) -> bool {
        self.transcript.len() >= self.turn_budget
    }

    pub fn speaker_for(&self, role: DebateRole) -> ProviderId {
        match role {
            DebateRole::Defender => self.defender,
            DebateRole::Challenger => self.challenger,
        }
    }

    /// Text the next speaker responds to
    pub fn last_message(&self) -> &str {
        self.transcript
            .last()
            .map(|e| e.text.as_str())
            .unwrap_or_default()
    }
}

/// A debate in progress between two bound adapters
pub struct Debate {
    config: DebateConfig,
    defender: Arc<dyn ProviderAdapter>,
    challenger: Arc<dyn ProviderAdapter>,
    state: DebateState,
}

impl Debate {
    /// Shuffle `agents` into defender and challenger
    pub fn new<R: Rng + ?Sized>(
        config: DebateConfig,
        agents: [Arc<dyn ProviderAdapter>; 2],
        rng: &mut R,
    ) -> Self {
        let mut agents = agents;
        agents.shuffle(rng);
        let [defender, challenger] = agents;
        let state = DebateState::new(
            config.topic.clone(),
            defender.id(),
            challenger.id(),
            config.turns,
        );
        info!(
            target: "debate",
            defender = %state.defender,
            challenger = %state.challenger,
            turns = config.turns,
            "{} will defend the topic, and {} will challenge it",
            state.defender,
            state.challenger
        );
        Self {
            config,
            defender,
            challenger,
            state,
        }
    }

    pub fn from_registry<R: Rng + ?Sized>(
        config: DebateConfig,
        registry: &ProviderRegistry,
        agents: [ProviderId; 2],
        rng: &mut R,
    ) -> Result<Self> {
        let first = registry.get(agents[0])?;
        let second = registry.get(agents[1])?;
        Ok(Self::new(config, [first, second], rng))
    }

    pub fn state(&self) -> &DebateState {
        &self.state
    }

    /// Play one turn; `None` once the turn budget is spent
    pub async fn step(&mut self) -> Option<&DebateEntry> {
        if self.state.is_complete() {
            return None;
        }
        let turn = self.state.turn_count();
        let role = DebateRole::for_turn(turn);
        let adapter = match role {
            DebateRole::Defender => Arc::clone(&self.defender),
            DebateRole::Challenger => Arc::clone(&self.challenger),
        };
        let input = self.state.last_message().to_string();

        let (text, failed) = match self.respond(adapter.as_ref(), role, &input).await {
            Ok(text) => (text, false),
            Err(e) => {
                warn!(target: "debate", turn, speaker = %adapter.id(), error = %e, "turn failed");
                (e.to_string(), true)
            }
        };
        info!(target: "debate", turn, speaker = %adapter.id(), role = %role, failed, "turn complete");

        self.state.transcript.push(DebateEntry {
            speaker: adapter.id(),
            role,
            input,
            text,
            failed,
        });
        self.state.transcript.last()
    }

    /// Play every remaining turn
    #[tracing::instrument(skip_all, fields(topic = %self.config.topic))]
    pub async fn run(mut self) -> DebateState {
        while self.step().await.is_some() {}
        self.state
    }

    async fn respond(
        &self,
        adapter: &dyn ProviderAdapter,
        role: DebateRole,
        opponent: &str,
    ) -> std::result::Result<String, ProviderError> {
        let conversation = Conversation::from_prompt(
            self.config.system_prompt(),
            debate_turn_prompt(&self.config.topic, role, opponent),
        );
        let stream = adapter.send(ChatRequest::new(conversation)).await?;
        Ok(match collect_final(stream).await? {
            ProviderResponse::Final { text } => text,
            ProviderResponse::StreamChunk { partial_text } => partial_text,
            ProviderResponse::ToolRequested { .. } => String::new(),
        })
    }
}
