//! Human proxy agent

use async_trait::async_trait;

use super::Agent;
use crate::agents::domain::{AgentMessage, AgentRole};
use crate::agents::error::AgentResult;

/// Stand-in for the human admin; opens conversations and never asks for input
pub struct UserProxyAgent {
    name: String,
    system_prompt: String,
    received: Vec<AgentMessage>,
}

impl UserProxyAgent {
    pub fn new(name: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
            received: Vec::new(),
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Messages delivered to the proxy so far
    pub fn received(&self) -> &[AgentMessage] {
        &self.received
    }
}

#[async_trait]
impl Agent for UserProxyAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn role(&self) -> AgentRole {
        AgentRole::Admin
    }

    fn receive(&mut self, message: &AgentMessage, _sender: &str) {
        self.received.push(message.clone());
    }

    async fn reply(&mut self, _sender: &str) -> AgentResult<AgentMessage> {
        Ok(AgentMessage::text(""))
    }
}
