use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::aggregator::ResultAggregator;
use crate::conversation::{Conversation, ToolCallRequest};
use crate::llm::{collect_final, ChatRequest, ProviderAdapter, ProviderResponse};
use crate::side_channel::{spawn_side_channel, SideChannel};
use crate::tools::{ToolError, ToolInvoker, ToolResult};
use crate::Result;

/// Where a single-agent turn currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnState {
    AwaitingUserInput,
    ProviderCall,
    ToolDispatch,
    Done,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatSessionConfig {
    pub system_prompt: Option<String>,
    /// Offer registered tools on the first provider call of each turn
    pub tools_enabled: bool,
    pub stream: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub reply: String,
    pub state: TurnState,
    pub tool_dispatches: usize,
    pub tool_results: Vec<ToolResult>,
}

/// One user's conversation with one backend.
///
/// A turn makes at most one tool round trip: the follow-up call after a tool
/// result goes out without tools and its answer is taken as final.
pub struct ChatSession {
    adapter: Arc<dyn ProviderAdapter>,
    config: ChatSessionConfig,
    invoker: Option<ToolInvoker>,
    aggregator: Option<ResultAggregator>,
    side_channel: Option<Arc<dyn SideChannel>>,
    state: TurnState,
}

impl ChatSession {
    pub fn new(adapter: Arc<dyn ProviderAdapter>, config: ChatSessionConfig) -> Self {
        Self {
            adapter,
            config,
            invoker: None,
            aggregator: None,
            side_channel: None,
            state: TurnState::AwaitingUserInput,
        }
    }

    pub fn with_tools(mut self, invoker: ToolInvoker) -> Self {
        self.invoker = Some(invoker);
        self
    }

    pub fn with_aggregator(mut self, aggregator: ResultAggregator) -> Self {
        self.aggregator = Some(aggregator);
        self
    }

    pub fn with_side_channel(mut self, channel: Arc<dyn SideChannel>) -> Self {
        self.side_channel = Some(channel);
        self
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn config(&self) -> &ChatSessionConfig {
        &self.config
    }

    /// Fresh conversation seeded with the configured system prompt
    pub fn start(&self) -> Conversation {
        match &self.config.system_prompt {
            Some(prompt) => Conversation::with_system(prompt.clone()),
            None => Conversation::new(),
        }
    }

    /// Append the user's text and run a turn
    pub async fn send_user(
        &mut self,
        conversation: &mut Conversation,
        text: impl Into<String>,
    ) -> Result<TurnOutcome> {
        conversation.push_user(text)?;
        self.run_turn(conversation).await
    }

    /// Drive the conversation to a final assistant message
    #[tracing::instrument(skip_all, fields(provider = %self.adapter.id()))]
    pub async fn run_turn(&mut self, conversation: &mut Conversation) -> Result<TurnOutcome> {
        let result = self.drive(conversation).await;
        self.state = match &result {
            Ok(outcome) => outcome.state,
            Err(_) => TurnState::AwaitingUserInput,
        };
        result
    }

    async fn drive(&mut self, conversation: &mut Conversation) -> Result<TurnOutcome> {
        let tools = match (&self.invoker, self.config.tools_enabled) {
            (Some(invoker), true) => invoker.registry().specs(),
            _ => Vec::new(),
        };

        self.state = TurnState::ProviderCall;
        let first = self.call(conversation, tools).await?;

        let mut tool_results = Vec::new();
        let reply = match first {
            ProviderResponse::ToolRequested { request } => {
                self.state = TurnState::ToolDispatch;
                conversation.push_tool_request(request.clone())?;
                let result = self.dispatch(&request).await;
                conversation.push_tool_result(result.call_id.clone(), result.content.clone())?;
                tool_results.push(result);

                self.state = TurnState::ProviderCall;
                match self.call(conversation, Vec::new()).await? {
                    ProviderResponse::ToolRequested { request } => unanswered(&request),
                    other => text_of(other),
                }
            }
            other => text_of(other),
        };

        conversation.push_assistant(reply.clone())?;
        info!(
            target: "chat",
            provider = %self.adapter.id(),
            tool_dispatches = tool_results.len(),
            chars = reply.len(),
            "turn complete"
        );

        if let Some(channel) = &self.side_channel {
            spawn_side_channel(Arc::clone(channel), reply.clone());
        }

        Ok(TurnOutcome {
            reply,
            state: TurnState::Done,
            tool_dispatches: tool_results.len(),
            tool_results,
        })
    }

    async fn call(
        &self,
        conversation: &Conversation,
        tools: Vec<crate::ToolSpec>,
    ) -> Result<ProviderResponse> {
        debug!(
            target: "chat",
            provider = %self.adapter.id(),
            messages = conversation.len(),
            tools = tools.len(),
            "provider call"
        );
        let request = ChatRequest::new(conversation.clone())
            .with_tools(tools)
            .streaming(self.config.stream);
        let mut stream = self.adapter.send(request).await?;
        if let Some(aggregator) = &self.aggregator {
            aggregator.reset();
            stream = aggregator.accumulate(stream);
        }
        Ok(collect_final(stream).await?)
    }

    /// Unknown tools and missing invokers become failure text, never an error
    async fn dispatch(&self, request: &ToolCallRequest) -> ToolResult {
        let outcome = match &self.invoker {
            Some(invoker) => invoker.invoke(request).await,
            None => Err(ToolError::UnknownTool {
                name: request.name.clone(),
            }),
        };
        outcome.unwrap_or_else(|e| {
            warn!(target: "chat", tool = %request.name, error = %e, "tool round trip failed");
            ToolResult::failure(&request.call_id, &e)
        })
    }
}

fn text_of(response: ProviderResponse) -> String {
    match response {
        ProviderResponse::Final { text } => text,
        ProviderResponse::StreamChunk { partial_text } => partial_text,
        ProviderResponse::ToolRequested { request } => unanswered(&request),
    }
}

fn unanswered(request: &ToolCallRequest) -> String {
    format!(
        "The model requested the tool '{}' again; only one tool call is made per turn.",
        request.name
    )
}
