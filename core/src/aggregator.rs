//! Running display text for a streamed reply.
//!
//! Chunks are cumulative, so the display state is replaced, never appended to.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::watch;
use tracing::trace;

use crate::llm::{ProviderResponse, ProviderStream};

#[derive(Clone)]
pub struct ResultAggregator {
    tx: Arc<watch::Sender<String>>,
}

impl Default for ResultAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultAggregator {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(String::new());
        Self { tx: Arc::new(tx) }
    }

    /// Receiver for the display layer; always holds the latest text
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> String {
        self.tx.borrow().clone()
    }

    /// Clear the display before a new reply
    pub fn reset(&self) {
        self.tx.send_replace(String::new());
    }

    /// Apply one reply item; tool requests leave the display as is
    pub fn observe(&self, response: &ProviderResponse) {
        let text = match response {
            ProviderResponse::StreamChunk { partial_text } => partial_text,
            ProviderResponse::Final { text } => text,
            ProviderResponse::ToolRequested { .. } => return,
        };
        self.tx.send_if_modified(|shown| {
            if shown == text {
                return false;
            }
            trace!(target: "aggregator", len = text.len(), "display updated");
            shown.clone_from(text);
            true
        });
    }

    /// Pass every item through unchanged while mirroring text into the display
    pub fn accumulate(&self, stream: ProviderStream) -> ProviderStream {
        let this = self.clone();
        Box::pin(stream.inspect(move |item| {
            if let Ok(response) = item {
                this.observe(response);
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_request_keeps_display() {
        let agg = ResultAggregator::new();
        agg.observe(&ProviderResponse::StreamChunk {
            partial_text: "Hel".into(),
        });
        agg.observe(&ProviderResponse::ToolRequested {
            request: crate::ToolCallRequest::from_raw("c", "t", &serde_json::Value::Null),
        });
        assert_eq!(agg.current(), "Hel");
    }
}
