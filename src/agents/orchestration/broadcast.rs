//! Broadcast conversation: one agent sends the same prompt to every other agent

use tracing::info;

use super::Orchestrator;
use crate::agents::domain::{AgentMessage, ConversationResult};
use crate::agents::error::AgentResult;

impl Orchestrator {
    /// The first agent sends `prompt` to each other agent in list order
    ///
    /// Replies never chain into the next recipient. A recipient that answers
    /// with a call to one of its own tools runs it in a self-directed chat.
    pub async fn broadcast_conversation(&mut self, prompt: &str) -> AgentResult<ConversationResult> {
        info!(
            "-------- {} Orchestrator Starting (broadcast) --------",
            self.name
        );
        self.add_message(AgentMessage::text(prompt));

        let turns = self.broadcast_turns(prompt).await;
        self.conclude(turns)
    }

    async fn broadcast_turns(&mut self, prompt: &str) -> AgentResult<()> {
        for recipient in 1..self.agents.len() {
            self.memory_chat(0, recipient, AgentMessage::text(prompt))
                .await?;

            let pending = self
                .latest_message()
                .and_then(AgentMessage::as_function_call)
                .cloned();

            if let Some(call) = pending {
                if self.agents[recipient].has_tools() {
                    self.function_chat(recipient, recipient, call).await?;
                }
            }
        }

        Ok(())
    }
}
