use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::error::ToolError;
use super::registry::ToolRegistry;
use crate::conversation::ToolCallRequest;

/// Text payload ready to be wrapped into a `tool` message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub content: String,
}

impl ToolResult {
    /// Result describing a failed call, so the conversation can continue
    pub fn failure(call_id: impl Into<String>, error: &ToolError) -> Self {
        Self {
            call_id: call_id.into(),
            content: format!("Tool call failed: {error}"),
        }
    }
}

/// Runs model-requested tools against a registry
#[derive(Clone, Default)]
pub struct ToolInvoker {
    registry: ToolRegistry,
}

impl ToolInvoker {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Unknown names are an error; any failure of a known tool becomes degraded content.
    pub async fn invoke(&self, request: &ToolCallRequest) -> Result<ToolResult, ToolError> {
        if self.registry.get(&request.name).is_none() {
            warn!(target: "tool_invoker", tool = %request.name, call_id = %request.call_id, "Unknown tool requested");
            return Err(ToolError::UnknownTool {
                name: request.name.clone(),
            });
        }

        let arguments = Value::Object(request.arguments.clone());
        let content = match self.registry.call(&request.name, arguments).await {
            Ok(value) => content_to_text(value),
            Err(e) => {
                warn!(target: "tool_invoker", tool = %request.name, error = %e, "Tool failed, returning degraded result");
                return Ok(ToolResult::failure(&request.call_id, &e));
            }
        };
        debug!(target: "tool_invoker", tool = %request.name, bytes = content.len(), "Tool result ready");
        Ok(ToolResult {
            call_id: request.call_id.clone(),
            content,
        })
    }
}

/// Strings pass through verbatim, everything else is JSON text
pub fn content_to_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}
