//! End-of-run success decision

use serde::{Deserialize, Serialize};

/// Result of an end-of-run validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub success: bool,
    pub error_message: Option<String>,
}

impl ValidationOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
        }
    }
}

/// Externally supplied predicate called once a conversation has run its last turn
pub type ValidationHook = Box<dyn Fn() -> ValidationOutcome + Send + Sync>;

/// Hook that accepts every run
pub fn always_valid() -> ValidationHook {
    Box::new(ValidationOutcome::ok)
}

/// How a finished conversation is scored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationMode {
    /// The validation hook decides
    #[default]
    Hook,
    /// The final message must contain the completion keyword; the hook is not called
    Keyword,
    /// The hook must pass and the final message must contain the keyword
    HookAndKeyword,
}

/// Scoring rules applied by an orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationPolicy {
    #[serde(default)]
    pub termination: TerminationMode,
    #[serde(default = "default_completion_keyword")]
    pub completion_keyword: String,
}

fn default_completion_keyword() -> String {
    "APPROVED".to_string()
}

impl Default for ConversationPolicy {
    fn default() -> Self {
        Self {
            termination: TerminationMode::default(),
            completion_keyword: default_completion_keyword(),
        }
    }
}

impl ConversationPolicy {
    /// Score a finished run
    pub fn decide(&self, hook: &ValidationHook, last_message: &str) -> ValidationOutcome {
        match self.termination {
            TerminationMode::Hook => hook(),
            TerminationMode::Keyword => self.keyword_outcome(last_message),
            TerminationMode::HookAndKeyword => {
                let outcome = hook();
                if outcome.success {
                    self.keyword_outcome(last_message)
                } else {
                    outcome
                }
            }
        }
    }

    fn keyword_outcome(&self, last_message: &str) -> ValidationOutcome {
        if last_message.contains(&self.completion_keyword) {
            ValidationOutcome::ok()
        } else {
            ValidationOutcome::failed(format!(
                "Final message does not contain '{}'",
                self.completion_keyword
            ))
        }
    }
}
