//! Configuration types for agents

use serde::{Deserialize, Serialize};

use super::domain::ToolDefinition;

/// Base model configuration shared by every LLM-backed agent
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmProviderConfig {
    /// Model name/identifier
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable containing the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Custom base URL (for self-hosted or proxied endpoints)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Default temperature for completions
    #[serde(default = "default_temperature")]
    pub temperature: Option<f32>,
    /// Default max tokens for completions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Upper bound on retry time for rate limits and server errors
    #[serde(default = "default_max_retry_secs")]
    pub max_retry_secs: u64,
}

fn default_model() -> String {
    "gpt-4".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_temperature() -> Option<f32> {
    Some(0.0)
}

fn default_request_timeout() -> u64 {
    120
}

fn default_max_retry_secs() -> u64 {
    60
}

impl Default for LlmProviderConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key_env: default_api_key_env(),
            base_url: None,
            temperature: default_temperature(),
            max_tokens: None,
            request_timeout_secs: default_request_timeout(),
            max_retry_secs: default_max_retry_secs(),
        }
    }
}

impl LlmProviderConfig {
    /// Extend this base configuration with a set of callable functions
    pub fn with_functions(&self, functions: Vec<ToolDefinition>) -> FunctionConfig {
        FunctionConfig {
            base: self.clone(),
            functions,
        }
    }
}

/// Model configuration of one agent: the shared base plus the functions it may call
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FunctionConfig {
    #[serde(flatten)]
    pub base: LlmProviderConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<ToolDefinition>,
}

impl FunctionConfig {
    /// A configuration without callable functions
    pub fn plain(base: &LlmProviderConfig) -> Self {
        base.with_functions(Vec::new())
    }

    pub fn has_functions(&self) -> bool {
        !self.functions.is_empty()
    }
}

/// Identity and prompt of an LLM-backed agent
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentConfig {
    /// Unique agent name within a team
    pub name: String,
    /// System prompt for the agent
    pub system_prompt: String,
    /// Model configuration
    pub llm: FunctionConfig,
}
