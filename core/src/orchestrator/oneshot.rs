use futures::StreamExt;
use tracing::debug;

use super::prompts::{tone_system_prompt, TITLE_SYSTEM_PROMPT};
use crate::conversation::Conversation;
use crate::llm::{
    collect_final, ChatRequest, ProviderAdapter, ProviderError, ProviderResponse, ProviderStream,
};

/// Single non-streaming call without tools; the error is returned verbatim
pub async fn complete_once(
    adapter: &dyn ProviderAdapter,
    system: &str,
    user: &str,
) -> Result<String, ProviderError> {
    let request = ChatRequest::new(Conversation::from_prompt(system, user));
    let stream = adapter.send(request).await?;
    match collect_final(stream).await? {
        ProviderResponse::Final { text } | ProviderResponse::StreamChunk { partial_text: text } => {
            Ok(text)
        }
        ProviderResponse::ToolRequested { request } => Err(ProviderError::new(
            adapter.backend_name(),
            format!("unexpected tool request '{}'", request.name),
        )),
    }
}

/// Short subject line for an email body
#[tracing::instrument(skip_all, fields(provider = %adapter.id()))]
pub async fn generate_title(
    adapter: &dyn ProviderAdapter,
    email: &str,
) -> Result<String, ProviderError> {
    debug!(target: "chat", provider = %adapter.id(), chars = email.len(), "generating email title");
    let title = complete_once(adapter, TITLE_SYSTEM_PROMPT, email).await?;
    Ok(title.trim().to_string())
}

/// Streamed answer in the given tone; items are cumulative text
pub async fn stream_reply(
    adapter: &dyn ProviderAdapter,
    prompt: &str,
    tone: &str,
) -> Result<ProviderStream, ProviderError> {
    let conversation = Conversation::from_prompt(tone_system_prompt(tone), prompt);
    let request = ChatRequest::new(conversation).streaming(true);
    let stream = adapter.send(request).await?;
    // single-shot backends still end in a Final; surface it as a chunk
    Ok(Box::pin(stream.map(|item| {
        item.map(|response| match response {
            ProviderResponse::Final { text } => ProviderResponse::StreamChunk { partial_text: text },
            other => other,
        })
    })))
}
