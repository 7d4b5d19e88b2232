//! Conversation outcome types

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{string_argument, Chat};

/// The tool call that stopped a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFailure {
    /// Name of the tool that failed
    pub tool: String,
    /// Arguments the model supplied
    pub arguments: Value,
    /// Error text reported by the tool
    pub error: String,
}

impl ToolFailure {
    /// The SQL text of a failed `run_sql` call, if present
    pub fn sql(&self) -> Option<String> {
        string_argument(&self.arguments, "sql")
    }
}

/// Outcome of one conversation protocol run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationResult {
    pub success: bool,
    /// Full transcript of the run
    pub messages: Vec<Chat>,
    pub cost: f64,
    pub tokens: usize,
    pub last_message_str: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Set when a tool failure aborted the run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_failure: Option<ToolFailure>,
}

impl ConversationResult {
    /// Whether the run stopped on a failing `run_sql` call
    pub fn failed_on_sql(&self) -> bool {
        self.tool_failure
            .as_ref()
            .map_or(false, |failure| failure.tool == "run_sql")
    }
}
