mod common;

use std::sync::Arc;

use colloquy_core::orchestrator::prompts::OPENING_CLAUSE;
use colloquy_core::{
    Debate, DebateConfig, DebateRole, ProviderAdapter, ProviderError, ProviderId,
    ProviderRegistry,
};
use common::{final_text, StubAdapter};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn echo(id: ProviderId) -> Arc<StubAdapter> {
    StubAdapter::new(id, move |req, n| {
        assert_eq!(req.conversation.len(), 2);
        Ok(vec![final_text(&format!("{} says #{n}", id.label()))])
    })
}

fn agents(a: &Arc<StubAdapter>, b: &Arc<StubAdapter>) -> [Arc<dyn ProviderAdapter>; 2] {
    [a.clone(), b.clone()]
}

#[tokio::test]
async fn transcript_alternates_for_full_budget() {
    let gpt = echo(ProviderId::OpenAi);
    let llama = echo(ProviderId::Ollama);
    let mut rng = StdRng::seed_from_u64(7);

    let config = DebateConfig::new("Pineapple belongs on pizza").with_turns(6);
    let state = Debate::new(config, agents(&gpt, &llama), &mut rng).run().await;

    assert_eq!(state.turn_count(), 6);
    assert!(state.is_complete());
    assert_ne!(state.defender, state.challenger);
    for (i, entry) in state.transcript().iter().enumerate() {
        let role = if i % 2 == 0 {
            DebateRole::Defender
        } else {
            DebateRole::Challenger
        };
        assert_eq!(entry.role, role);
        assert_eq!(entry.speaker, state.speaker_for(role));
        assert!(!entry.failed);
    }
    assert_eq!(state.transcript()[0].input, "");
    assert_eq!(state.transcript()[1].input, state.transcript()[0].text);
    assert_eq!(gpt.call_count() + llama.call_count(), 6);
    assert_eq!(gpt.call_count(), 3);
}

#[tokio::test]
async fn opening_prompt_uses_sentinel() {
    let gpt = echo(ProviderId::OpenAi);
    let llama = echo(ProviderId::Ollama);
    let mut rng = StdRng::seed_from_u64(1);
    let state = Debate::new(DebateConfig::new("Tabs"), agents(&gpt, &llama), &mut rng)
        .run()
        .await;
    assert_eq!(state.turn_count(), 8);

    let opener = if state.defender == ProviderId::OpenAi {
        &gpt
    } else {
        &llama
    };
    let first = &opener.requests()[0];
    let user = &first.conversation.messages()[1].content;
    assert!(user.starts_with("The topic is: Tabs. Your role is the Defender of this topic."));
    assert!(user.ends_with(OPENING_CLAUSE));
    let system = first.conversation.system_prompt().unwrap();
    assert!(system.contains("Response max 50 words."));
}

#[tokio::test]
async fn same_seed_same_roles() {
    let roles = |seed| {
        let gpt = echo(ProviderId::OpenAi);
        let claude = echo(ProviderId::Anthropic);
        let mut rng = StdRng::seed_from_u64(seed);
        let debate = Debate::new(DebateConfig::new("x"), agents(&gpt, &claude), &mut rng);
        (debate.state().defender, debate.state().challenger)
    };
    for seed in 0..16 {
        assert_eq!(roles(seed), roles(seed));
    }
    let distinct: std::collections::HashSet<_> = (0..32).map(roles).collect();
    assert_eq!(distinct.len(), 2, "both role bindings should be reachable");
}

#[tokio::test]
async fn provider_failure_becomes_transcript_entry() {
    let gpt = echo(ProviderId::OpenAi);
    let broken = StubAdapter::new(ProviderId::Ollama, |_, _| {
        Err(ProviderError::new("Ollama", "connection refused"))
    });
    let mut rng = StdRng::seed_from_u64(3);
    let state = Debate::new(
        DebateConfig::new("Rust vs Go").with_turns(4),
        agents(&gpt, &broken),
        &mut rng,
    )
    .run()
    .await;

    assert_eq!(state.turn_count(), 4);
    let failures: Vec<_> = state.transcript().iter().filter(|e| e.failed).collect();
    assert_eq!(failures.len(), 2);
    for entry in failures {
        assert_eq!(entry.speaker, ProviderId::Ollama);
        assert_eq!(entry.text, "Error from Ollama: connection refused");
    }
}

#[tokio::test]
async fn from_registry_rejects_missing_agent() {
    let registry = ProviderRegistry::new().with(echo(ProviderId::OpenAi));
    let mut rng = StdRng::seed_from_u64(0);
    let result = Debate::from_registry(
        DebateConfig::new("x"),
        &registry,
        [ProviderId::OpenAi, ProviderId::Gemini],
        &mut rng,
    );
    assert!(result.is_err());
}

#[tokio::test]
async fn zero_turns_is_immediately_complete() {
    let gpt = echo(ProviderId::OpenAi);
    let llama = echo(ProviderId::Ollama);
    let mut rng = StdRng::seed_from_u64(0);
    let mut debate = Debate::new(
        DebateConfig::new("x").with_turns(0),
        agents(&gpt, &llama),
        &mut rng,
    );
    assert!(debate.step().await.is_none());
    assert_eq!(gpt.call_count() + llama.call_count(), 0);
}
