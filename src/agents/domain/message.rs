//! Message and transcript types

use serde::{Deserialize, Serialize};

use super::ToolCall;

/// Message role in a model context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System message (instructions to the LLM)
    System,
    /// User message
    User,
    /// Assistant (LLM) message
    Assistant,
    /// Tool result message
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A message in an agent's private model context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: Role,
    /// Message content (text)
    pub content: String,
    /// Tool calls made by the assistant (if any)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// ID of the tool call this message is responding to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Optional name for the message sender
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    /// Create an assistant message with tool calls
    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: if tool_calls.is_empty() {
                None
            } else {
                Some(tool_calls)
            },
            tool_call_id: None,
            name: None,
        }
    }

    /// Create a tool result message
    pub fn tool_result(tool_call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: output.into(),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
            name: None,
        }
    }

    /// Attach a sender name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A message exchanged between agents: plain text or a structured tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AgentMessage {
    /// A request to run one of the replying agent's tools
    FunctionCall { function_call: ToolCall },
    /// Plain text
    Text(String),
}

impl AgentMessage {
    /// Create a text message
    pub fn text(content: impl Into<String>) -> Self {
        AgentMessage::Text(content.into())
    }

    /// Create a function call message
    pub fn function_call(call: ToolCall) -> Self {
        AgentMessage::FunctionCall { function_call: call }
    }

    pub fn is_function_call(&self) -> bool {
        matches!(self, AgentMessage::FunctionCall { .. })
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AgentMessage::Text(text) => Some(text),
            AgentMessage::FunctionCall { .. } => None,
        }
    }

    pub fn as_function_call(&self) -> Option<&ToolCall> {
        match self {
            AgentMessage::FunctionCall { function_call } => Some(function_call),
            AgentMessage::Text(_) => None,
        }
    }

    /// Render the message as a single string; function calls render as JSON
    pub fn render(&self) -> String {
        match self {
            AgentMessage::Text(text) => text.clone(),
            AgentMessage::FunctionCall { .. } => {
                serde_json::to_string(self).unwrap_or_default()
            }
        }
    }
}

impl From<&str> for AgentMessage {
    fn from(value: &str) -> Self {
        AgentMessage::Text(value.to_string())
    }
}

impl From<String> for AgentMessage {
    fn from(value: String) -> Self {
        AgentMessage::Text(value)
    }
}

impl std::fmt::Display for AgentMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render())
    }
}

/// One recorded hop of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub from_name: String,
    pub to_name: String,
    pub message: AgentMessage,
    /// Unix epoch milliseconds; never decreases within one transcript
    pub created: i64,
}

impl Chat {
    pub fn new(
        from_name: impl Into<String>,
        to_name: impl Into<String>,
        message: AgentMessage,
        created: i64,
    ) -> Self {
        Self {
            from_name: from_name.into(),
            to_name: to_name.into(),
            message,
            created,
        }
    }
}

/// Hands out non-decreasing timestamps for transcript entries
#[derive(Debug, Default, Clone)]
pub struct ChatClock {
    last: i64,
}

impl ChatClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current time in epoch milliseconds, clamped to the last value handed out
    pub fn tick(&mut self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        self.last = self.last.max(now);
        self.last
    }
}
