//! Best-effort delivery of a final reply to somewhere other than the caller
//! (speech output, a log, a webhook).
//!
//! Delivery runs on a detached task: it is not cancelled when the turn
//! returns and there is no ordering guarantee relative to the caller.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::Result;

#[async_trait]
pub trait SideChannel: Send + Sync {
    fn name(&self) -> String;

    async fn deliver(&self, text: String) -> Result<()>;
}

/// Fire-and-forget delivery; failures are logged and dropped
pub fn spawn_side_channel(channel: Arc<dyn SideChannel>, text: impl Into<String>) -> JoinHandle<()> {
    let text = text.into();
    tokio::spawn(async move {
        let name = channel.name();
        if text.trim().is_empty() {
            debug!(target: "side_channel", channel = %name, "nothing to deliver");
            return;
        }
        match channel.deliver(text).await {
            Ok(()) => debug!(target: "side_channel", channel = %name, "delivered"),
            Err(e) => warn!(target: "side_channel", channel = %name, error = %e, "delivery failed"),
        }
    })
}
