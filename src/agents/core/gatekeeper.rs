//! Gatekeeper agent that rates prompts before any SQL work starts

use async_trait::async_trait;

use super::{Agent, LlmAgent};
use crate::agents::domain::{AgentMessage, AgentRole};
use crate::agents::error::AgentResult;

/// Rank used when the model answer carries no usable rank
pub const DEFAULT_RANK: &str = "3";

/// Wraps a model-backed agent and reduces its answer to a single rank from 1 to 5
pub struct GatekeeperAgent {
    inner: LlmAgent,
}

impl GatekeeperAgent {
    pub fn new(inner: LlmAgent) -> Self {
        Self { inner }
    }
}

/// First standalone digit 1-5 in a model answer, or [`DEFAULT_RANK`]
pub fn extract_rank(answer: &str) -> String {
    answer
        .split(|c: char| !c.is_ascii_alphanumeric())
        .find(|token| matches!(*token, "1" | "2" | "3" | "4" | "5"))
        .unwrap_or(DEFAULT_RANK)
        .to_string()
}

#[async_trait]
impl Agent for GatekeeperAgent {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn role(&self) -> AgentRole {
        AgentRole::Gatekeeper
    }

    fn receive(&mut self, message: &AgentMessage, sender: &str) {
        let framed = AgentMessage::text(format!("Block of Text: {}", message.render()));
        self.inner.receive(&framed, sender);
    }

    async fn reply(&mut self, sender: &str) -> AgentResult<AgentMessage> {
        let answer = self.inner.reply(sender).await?;
        Ok(AgentMessage::Text(extract_rank(&answer.render())))
    }
}
