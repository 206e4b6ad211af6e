use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::error::ToolError;
use crate::conversation::ToolSpec;

/// A side-effecting capability a model may request by name
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of the tool (e.g., "get_latest_news")
    fn name(&self) -> String;

    /// A human-readable description of what the tool does
    fn description(&self) -> String;

    /// The JSON Schema for the tool's arguments
    fn parameters(&self) -> Value;

    /// Execute the tool with the given arguments
    async fn call(&self, arguments: Value) -> Result<Value, ToolError>;

    /// Declaration handed to providers
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name(),
            description: self.description(),
            parameters: self.parameters(),
        }
    }
}

type SyncFn = dyn Fn(Value) -> Result<Value, String> + Send + Sync;

/// A plain synchronous function registered under a name
#[derive(Clone)]
pub struct FnTool {
    name: String,
    description: String,
    parameters: Value,
    func: Arc<SyncFn>,
}

impl FnTool {
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        func: F,
    ) -> Self
    where
        F: Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            func: Arc::new(func),
        }
    }
}

impl fmt::Debug for FnTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTool").field("name", &self.name).finish()
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn parameters(&self) -> Value {
        self.parameters.clone()
    }

    async fn call(&self, arguments: Value) -> Result<Value, ToolError> {
        (self.func)(arguments).map_err(ToolError::ExecutionFailed)
    }
}
