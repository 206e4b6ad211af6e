mod config;

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use colloquy_core::orchestrator::prompts::{DEFAULT_TONE, TONES};
use colloquy_core::tools::native::LatestNewsTool;
use colloquy_core::{
    generate_title, stream_reply, ChatSession, ChatSessionConfig, Debate, DebateConfig,
    ProviderError, ProviderId, ProviderRegistry, ResultAggregator, SideChannel, ToolInvoker,
    ToolRegistry,
};
use colloquy_speech::{LocalSpeech, OpenAiSpeech};
use config::{ColloquyConfig, SpeechEngine};
use futures::StreamExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "colloquy", version, about = "Talk to several LLM backends from one place")]
struct Cli {
    /// TOML config file (defaults to $COLLOQUY_CONFIG or ./colloquy.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Two models debate a topic, one defending and one challenging
    Debate {
        #[arg(long)]
        topic: String,
        #[arg(long)]
        turns: Option<usize>,
        /// Fix the role assignment
        #[arg(long)]
        seed: Option<u64>,
        /// Two agents, e.g. "gpt,ollama"
        #[arg(long, value_delimiter = ',')]
        agents: Option<Vec<String>>,
    },
    /// Chat about current news; replies are read aloud
    News {
        #[arg(long)]
        mute: bool,
    },
    /// Suggest a subject line for an email read from a file or stdin
    Title {
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Stream one answer in a chosen tone
    Ask {
        #[arg(long, default_value = "GPT")]
        model: String,
        #[arg(long, default_value = DEFAULT_TONE)]
        tone: String,
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logging / tracing
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,colloquy_core=info,colloquy=info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = dotenvy::dotenv() {
        info!(target: "colloquy", error = %e, "No .env loaded");
    }

    let cli = Cli::parse();
    let cfg = ColloquyConfig::load(cli.config.as_deref());
    log_api_keys(&cfg);

    let registry = ProviderRegistry::from_configs(cfg.providers())
        .context("failed to build provider clients")?;

    match cli.command {
        Command::Debate {
            topic,
            turns,
            seed,
            agents,
        } => run_debate(&cfg, &registry, topic, turns, seed, agents).await,
        Command::News { mute } => run_news(&cfg, &registry, mute).await,
        Command::Title { file } => run_title(&registry, file).await,
        Command::Ask {
            model,
            tone,
            prompt,
        } => run_ask(&registry, &model, &tone, &prompt.join(" ")).await,
    }
}

/// Report which keys are present without ever printing them in full
fn log_api_keys(cfg: &ColloquyConfig) {
    for (id, preview_len) in [
        (ProviderId::OpenAi, 8),
        (ProviderId::Anthropic, 7),
        (ProviderId::Gemini, 8),
    ] {
        match cfg.provider(id).key_preview(preview_len) {
            Some(prefix) => info!(
                target: "colloquy",
                "{} API Key exists and begins {}",
                id.backend_name(),
                prefix
            ),
            None => warn!(target: "colloquy", "{} API Key not set", id.backend_name()),
        }
    }
}

async fn run_debate(
    cfg: &ColloquyConfig,
    registry: &ProviderRegistry,
    topic: String,
    turns: Option<usize>,
    seed: Option<u64>,
    agents: Option<Vec<String>>,
) -> anyhow::Result<()> {
    let names = agents.unwrap_or_else(|| cfg.debate.agents.clone());
    let [first, second] = names.as_slice() else {
        bail!("a debate needs exactly two agents, got {}", names.len());
    };
    let pair = [first.parse::<ProviderId>()?, second.parse::<ProviderId>()?];

    let config = DebateConfig {
        topic,
        turns: turns.unwrap_or(cfg.debate.turns),
        system_prompt: cfg.debate.system_prompt.clone(),
        max_words: cfg.debate.max_words,
    };
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let mut debate = Debate::from_registry(config, registry, pair, &mut rng)?;

    let state = debate.state();
    println!(
        "**{} will defend the topic, and {} will challenge it.**\n",
        state.defender, state.challenger
    );
    while let Some(entry) = debate.step().await {
        println!("**{}**: {}\n", entry.speaker, entry.text);
    }
    Ok(())
}

async fn run_news(
    cfg: &ColloquyConfig,
    registry: &ProviderRegistry,
    mute: bool,
) -> anyhow::Result<()> {
    let adapter = registry.resolve(&cfg.news.provider)?;

    let tools = ToolRegistry::new();
    tools.register(Arc::new(
        LatestNewsTool::new(cfg.news.brave_api_key.clone())
            .with_max_articles(cfg.news.max_articles),
    ));

    let mut session = ChatSession::new(
        adapter,
        ChatSessionConfig {
            system_prompt: Some(cfg.news.system_prompt.clone()),
            tools_enabled: true,
            stream: false,
        },
    )
    .with_tools(ToolInvoker::new(tools));
    if !mute {
        if let Some(channel) = speech_channel(cfg) {
            info!(target: "colloquy", channel = %channel.name(), "Speaking replies");
            session = session.with_side_channel(channel);
        }
    }

    let mut conversation = session.start();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt_marker()?;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if matches!(line, "exit" | "quit") {
            break;
        }
        if line.is_empty() {
            prompt_marker()?;
            continue;
        }
        match session.send_user(&mut conversation, line).await {
            Ok(outcome) => println!("{}\n", outcome.reply),
            Err(e) => println!("{}\n", e),
        }
        prompt_marker()?;
    }
    Ok(())
}

fn prompt_marker() -> std::io::Result<()> {
    print!("> ");
    std::io::stdout().flush()
}

fn speech_channel(cfg: &ColloquyConfig) -> Option<Arc<dyn SideChannel>> {
    match cfg.speech.engine {
        SpeechEngine::Off => None,
        SpeechEngine::Local => Some(Arc::new(LocalSpeech::new(cfg.speech.local.clone()))),
        SpeechEngine::OpenAi => Some(Arc::new(OpenAiSpeech::new(cfg.speech.openai.clone()))),
    }
}

async fn run_title(registry: &ProviderRegistry, file: Option<PathBuf>) -> anyhow::Result<()> {
    let email = match file {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin().read_to_string(&mut buf).await?;
            buf
        }
    };
    if email.trim().is_empty() {
        bail!("no email text given");
    }

    let adapter = registry.get(ProviderId::OpenAi)?;
    let title = title_or_error(generate_title(adapter.as_ref(), &email).await)?;
    println!("{title}");
    Ok(())
}

fn title_or_error(result: Result<String, ProviderError>) -> anyhow::Result<String> {
    result.map_err(|e| anyhow!("An error occurred while generating the title: {e}"))
}

async fn run_ask(
    registry: &ProviderRegistry,
    model: &str,
    tone: &str,
    prompt: &str,
) -> anyhow::Result<()> {
    if !TONES.contains(&tone) {
        warn!(target: "colloquy", tone, "Unusual tone, sending as given");
    }
    let adapter = registry.resolve(model)?;
    let aggregator = ResultAggregator::new();
    let mut stream = aggregator.accumulate(stream_reply(adapter.as_ref(), prompt, tone).await?);

    // chunks are cumulative: print only what was not shown yet
    let mut shown = 0;
    let mut stdout = std::io::stdout();
    while let Some(item) = stream.next().await {
        item?;
        let text = aggregator.current();
        if text.len() > shown {
            write!(stdout, "{}", &text[shown..])?;
            stdout.flush()?;
            shown = text.len();
        }
    }
    writeln!(stdout)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_failure_is_reported_as_error() {
        let err = title_or_error(Err(ProviderError::new("OpenAI", "status=500")))
            .unwrap_err()
            .to_string();
        assert_eq!(
            err,
            "An error occurred while generating the title: Error from OpenAI: status=500"
        );
        assert_eq!(title_or_error(Ok("Lunch".into())).unwrap(), "Lunch");
    }

    #[test]
    fn cli_parses_debate_agents() {
        let cli = Cli::try_parse_from([
            "colloquy", "debate", "--topic", "Tabs", "--agents", "claude,gemini",
        ])
        .unwrap();
        match cli.command {
            Command::Debate { topic, agents, .. } => {
                assert_eq!(topic, "Tabs");
                assert_eq!(agents.unwrap(), vec!["claude", "gemini"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
