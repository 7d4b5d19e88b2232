//! Sequential conversation: each agent hands the running message to the next

use tracing::info;

use super::Orchestrator;
use crate::agents::domain::{AgentMessage, ConversationResult};
use crate::agents::error::AgentResult;

impl Orchestrator {
    /// Visit the agents in order, agent `i` talking to agent `i + 1`
    ///
    /// When the final agent is handed a function call it can run, it runs
    /// it before the conversation is scored.
    pub async fn sequential_conversation(&mut self, prompt: &str) -> AgentResult<ConversationResult> {
        info!(
            "-------- {} Orchestrator Starting (sequential) --------",
            self.name
        );
        self.add_message(AgentMessage::text(prompt));

        let turns = self.sequential_turns().await;
        self.conclude(turns)
    }

    async fn sequential_turns(&mut self) -> AgentResult<()> {
        let total = self.agents.len();

        for idx in 0..total - 1 {
            let next = idx + 1;
            self.hop(idx, next).await?;

            if idx == total - 2 {
                let pending = self
                    .latest_message()
                    .and_then(AgentMessage::as_function_call)
                    .cloned();

                if let Some(call) = pending {
                    if self.agents[next].has_tools() {
                        self.execute_call(next, &call).await?;
                    }
                }
            }
        }

        Ok(())
    }
}
