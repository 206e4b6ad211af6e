// Colloquy Core Library
// Multi-provider conversational turn orchestration

pub mod aggregator;
pub mod conversation;
pub mod llm;
pub mod orchestrator;
pub mod side_channel;
pub mod tools;

// Export core types
pub use aggregator::ResultAggregator;
pub use conversation::{Conversation, Message, Role, ToolCallRequest, ToolSpec};
pub use llm::{
    ChatRequest, ProviderAdapter, ProviderConfig, ProviderError, ProviderId, ProviderRegistry,
    ProviderResponse, ProviderStream,
};
pub use orchestrator::{
    complete_once, generate_title, stream_reply, ChatSession, ChatSessionConfig, Debate,
    DebateConfig, DebateEntry, DebateRole, DebateState, TurnOutcome, TurnState,
};
pub use side_channel::{spawn_side_channel, SideChannel};
pub use tools::{FnTool, Tool, ToolError, ToolInvoker, ToolRegistry, ToolResult};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ColloquyError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Invalid conversation: {0}")]
    InvalidConversation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Side channel error: {0}")]
    SideChannel(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
pub type Result<T> = std::result::Result<T, ColloquyError>;
