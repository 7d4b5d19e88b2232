//! Round-robin conversation: agents take turns cyclically

use tracing::{debug, info};

use super::Orchestrator;
use crate::agents::domain::{AgentMessage, ConversationResult};
use crate::agents::error::AgentResult;

impl Orchestrator {
    /// Run `loops` full cycles over the team
    ///
    /// Turn `t` goes from agent `t % n` to agent `(t + 1) % n`. The running
    /// message is reset to `prompt` at the start of every cycle.
    pub async fn round_robin_conversation(
        &mut self,
        prompt: &str,
        loops: usize,
    ) -> AgentResult<ConversationResult> {
        info!(
            "-------- {} Orchestrator Starting (round robin, {} loops) --------",
            self.name, loops
        );

        let turns = self.round_robin_turns(prompt, loops).await;
        self.conclude(turns)
    }

    async fn round_robin_turns(&mut self, prompt: &str, loops: usize) -> AgentResult<()> {
        let total = self.agents.len();

        for turn in 0..loops * total {
            let current = turn % total;
            let next = (turn + 1) % total;

            if current == 0 {
                debug!("{} cycle {} starts from the prompt", self.name, turn / total);
                self.add_message(AgentMessage::text(prompt));
            }

            self.hop(current, next).await?;
        }

        Ok(())
    }
}
