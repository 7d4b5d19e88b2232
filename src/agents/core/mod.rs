//! Agent implementations
//!
//! - [`LlmAgent`]: model-backed participant, optionally equipped with tools
//! - [`UserProxyAgent`]: the human admin that opens conversations
//! - [`GatekeeperAgent`]: rates whether a prompt is a database question

mod gatekeeper;
mod llm_agent;
mod user_proxy;

pub use gatekeeper::{extract_rank, GatekeeperAgent, DEFAULT_RANK};
pub use llm_agent::LlmAgent;
pub use user_proxy::UserProxyAgent;

use async_trait::async_trait;

use crate::agents::domain::{AgentMessage, AgentRole, ToolCall};
use crate::agents::error::AgentResult;
use crate::agents::tools::Toolbox;

/// A conversation participant
///
/// The orchestrator delivers messages with [`Agent::receive`] and asks for an
/// answer with [`Agent::reply`]. Tools are never run by the agent itself; the
/// orchestrator resolves function calls against [`Agent::toolbox`] and reports
/// the output back through [`Agent::receive_tool_result`].
#[async_trait]
pub trait Agent: Send + Sync {
    /// Unique name within a team
    fn name(&self) -> &str;

    fn role(&self) -> AgentRole;

    /// Tools this agent may call
    fn toolbox(&self) -> Option<&Toolbox> {
        None
    }

    fn has_tools(&self) -> bool {
        self.toolbox().map_or(false, |toolbox| !toolbox.is_empty())
    }

    /// Enqueue a message into the agent's private context
    fn receive(&mut self, message: &AgentMessage, sender: &str);

    /// Produce plain text or a function call answering `sender`
    async fn reply(&mut self, sender: &str) -> AgentResult<AgentMessage>;

    /// Record the output of a function call this agent requested
    fn receive_tool_result(&mut self, _call: &ToolCall, _output: &str) {}
}
