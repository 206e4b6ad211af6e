pub mod error;
pub mod invoker;
pub mod native;
pub mod registry;
pub mod traits;

// Re-export common types
pub use error::ToolError;
pub use invoker::{content_to_text, ToolInvoker, ToolResult};
pub use registry::ToolRegistry;
pub use traits::{FnTool, Tool};
