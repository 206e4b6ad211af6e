//! Conversation data model shared by every backend.
//!
//! A [`Conversation`] is an ordered list of [`Message`]s owned by exactly one
//! session. Appends are validated so the history a provider sees is always
//! well formed:
//! - a `system` message may only appear first
//! - a `tool` message must directly follow the assistant message that
//!   requested it and carry the same `tool_call_id`

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{ColloquyError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// Declares a capability a model may request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object
    pub parameters: Value,
}

/// Structured request from a model to run a named tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub call_id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCallRequest {
    /// Build a request from whatever argument shape a backend produced.
    /// Objects are kept, JSON-encoded strings are decoded, anything else becomes empty.
    pub fn from_raw(call_id: impl Into<String>, name: impl Into<String>, raw: &Value) -> Self {
        let arguments = match raw {
            Value::Object(map) => map.clone(),
            Value::String(s) => match serde_json::from_str::<Value>(s) {
                Ok(Value::Object(map)) => map,
                _ => Map::new(),
            },
            _ => Map::new(),
        };
        Self {
            call_id: call_id.into(),
            name: name.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Set on assistant messages that asked for a tool instead of answering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_request: Option<ToolCallRequest>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    pub fn assistant_tool_request(request: ToolCallRequest) -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            tool_call_id: None,
            tool_request: Some(request),
        }
    }

    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_call_id: Some(call_id.into()),
            tool_request: None,
        }
    }

    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call_id: None,
            tool_request: None,
        }
    }
}

/// Ordered, validated message history for one session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Message>", into = "Vec<Message>")]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(prompt)],
        }
    }

    /// System prompt followed by one user message
    pub fn from_prompt(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system), Message::user(user)],
        }
    }

    /// Append a message, enforcing role ordering
    pub fn push(&mut self, message: Message) -> Result<()> {
        check_append(&self.messages, &message)?;
        self.messages.push(message);
        Ok(())
    }

    pub fn push_user(&mut self, content: impl Into<String>) -> Result<()> {
        self.push(Message::user(content))
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) -> Result<()> {
        self.push(Message::assistant(content))
    }

    pub fn push_tool_request(&mut self, request: ToolCallRequest) -> Result<()> {
        self.push(Message::assistant_tool_request(request))
    }

    pub fn push_tool_result(
        &mut self,
        call_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<()> {
        self.push(Message::tool(call_id, content))
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .first()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Messages after the optional leading system prompt
    pub fn turns(&self) -> &[Message] {
        match self.messages.first() {
            Some(m) if m.role == Role::System => &self.messages[1..],
            _ => &self.messages,
        }
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl TryFrom<Vec<Message>> for Conversation {
    type Error = ColloquyError;

    fn try_from(messages: Vec<Message>) -> Result<Self> {
        let mut conversation = Conversation::new();
        for message in messages {
            conversation.push(message)?;
        }
        Ok(conversation)
    }
}

impl From<Conversation> for Vec<Message> {
    fn from(conversation: Conversation) -> Self {
        conversation.messages
    }
}

fn check_append(history: &[Message], message: &Message) -> Result<()> {
    match message.role {
        Role::System if !history.is_empty() => Err(ColloquyError::InvalidConversation(
            "system message must be the first message".into(),
        )),
        Role::Tool => {
            let call_id = message.tool_call_id.as_deref().ok_or_else(|| {
                ColloquyError::InvalidConversation("tool message without tool_call_id".into())
            })?;
            let requested = history
                .last()
                .filter(|m| m.role == Role::Assistant)
                .and_then(|m| m.tool_request.as_ref());
            match requested {
                Some(req) if req.call_id == call_id => Ok(()),
                Some(req) => Err(ColloquyError::InvalidConversation(format!(
                    "tool result for '{}' does not match pending request '{}'",
                    call_id, req.call_id
                ))),
                None => Err(ColloquyError::InvalidConversation(format!(
                    "tool result '{}' does not follow an assistant tool request",
                    call_id
                ))),
            }
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_raw_decodes_string_arguments() {
        let req = ToolCallRequest::from_raw("c1", "lookup", &json!("{\"topic\":\"rust\"}"));
        assert_eq!(req.arguments["topic"], "rust");

        let req = ToolCallRequest::from_raw("c2", "lookup", &json!("not json"));
        assert!(req.arguments.is_empty());

        let req = ToolCallRequest::from_raw("c3", "lookup", &json!({"topic": "go"}));
        assert_eq!(req.arguments["topic"], "go");
    }

    #[test]
    fn turns_skips_system_prompt() {
        let mut c = Conversation::with_system("Be terse");
        c.push_user("2+2?").unwrap();
        assert_eq!(c.turns().len(), 1);
        assert_eq!(c.system_prompt(), Some("Be terse"));
    }
}
