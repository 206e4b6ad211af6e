use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::error::ToolError;
use super::traits::Tool;
use crate::conversation::ToolSpec;

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// A registry for managing available tools
#[derive(Clone)]
pub struct ToolRegistry {
    tools: Arc<DashMap<String, Arc<dyn Tool>>>,
    call_timeout: Duration,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Arc::new(DashMap::new()),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Register a tool; a previous tool with the same name is replaced
    pub fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name();
        info!(target: "tool_registry", tool = %name, "Registering tool");

        if self.tools.insert(name.clone(), tool).is_some() {
            warn!(target: "tool_registry", tool = %name, "Tool name already registered, replaced");
        }
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|t| t.clone())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Declarations of every registered tool, sorted by name
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self.tools.iter().map(|t| t.spec()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Call a tool by name with timeout
    #[tracing::instrument(skip(self, arguments), fields(tool.name = %name))]
    pub async fn call(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        let start_time = std::time::Instant::now();

        let tool = self.get(name).ok_or_else(|| ToolError::UnknownTool {
            name: name.to_string(),
        })?;

        debug!(target: "tool_registry", tool = %name, "Invoking tool");

        let result = match timeout(self.call_timeout, tool.call(arguments)).await {
            Ok(res) => res,
            Err(_) => {
                warn!(target: "tool_registry", tool = %name, "Tool execution timed out");
                Err(ToolError::Timeout)
            }
        };

        let elapsed_ms = start_time.elapsed().as_secs_f64() * 1000.0;
        match &result {
            Ok(_) => debug!(target: "tool_registry", tool = %name, elapsed_ms, "Tool completed"),
            Err(e) => {
                warn!(target: "tool_registry", tool = %name, error = %e, elapsed_ms, "Tool execution failed")
            }
        }

        result
    }
}
