//! Model-backed agent

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::Agent;
use crate::agents::config::{AgentConfig, FunctionConfig};
use crate::agents::domain::{AgentMessage, AgentRole, Message, ToolCall};
use crate::agents::error::{AgentError, AgentResult};
use crate::agents::llm::{CompletionRequest, LlmProvider};
use crate::agents::tools::Toolbox;

/// Agent that answers by calling a language model with its private history
pub struct LlmAgent {
    name: String,
    role: AgentRole,
    system_prompt: String,
    llm: FunctionConfig,
    provider: Arc<dyn LlmProvider>,
    toolbox: Option<Toolbox>,
    context: Vec<Message>,
}

impl LlmAgent {
    /// Create an agent without tools
    pub fn new(config: AgentConfig, role: AgentRole, provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            name: config.name,
            role,
            system_prompt: config.system_prompt,
            llm: config.llm,
            provider,
            toolbox: None,
            context: Vec::new(),
        }
    }

    /// Equip the agent with tools; their definitions are added to the model config
    pub fn with_toolbox(mut self, toolbox: Toolbox) -> AgentResult<Self> {
        if !self.role.uses_tools() {
            return Err(AgentError::Configuration(format!(
                "Agent '{}' has role '{}' which cannot own tools",
                self.name, self.role
            )));
        }
        self.llm.functions = toolbox.definitions();
        self.toolbox = Some(toolbox);
        Ok(self)
    }

    /// The agent's private model context, oldest first
    pub fn context(&self) -> &[Message] {
        &self.context
    }

    fn build_request(&self) -> CompletionRequest {
        let mut messages = Vec::with_capacity(self.context.len() + 1);
        messages.push(Message::system(&self.system_prompt));
        messages.extend(self.context.iter().cloned());

        CompletionRequest {
            messages,
            model: Some(self.llm.base.model.clone()),
            temperature: self.llm.base.temperature,
            max_tokens: self.llm.base.max_tokens,
            tools: self.llm.has_functions().then(|| self.llm.functions.clone()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Agent for LlmAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn role(&self) -> AgentRole {
        self.role
    }

    fn toolbox(&self) -> Option<&Toolbox> {
        self.toolbox.as_ref()
    }

    fn receive(&mut self, message: &AgentMessage, sender: &str) {
        // Own replies are already in context
        if sender == self.name {
            return;
        }
        self.context
            .push(Message::user(message.render()).with_name(sender));
    }

    async fn reply(&mut self, sender: &str) -> AgentResult<AgentMessage> {
        debug!("{} replying to {}", self.name, sender);

        let response = self.provider.complete(self.build_request()).await?;
        let message = response.message;

        let first_call = message
            .tool_calls
            .as_ref()
            .and_then(|calls| calls.first().cloned());

        match first_call {
            Some(call) if self.has_tools() => {
                self.context.push(Message::assistant_with_tools(
                    message.content,
                    vec![call.clone()],
                ));
                Ok(AgentMessage::function_call(call))
            }
            _ => {
                self.context.push(Message::assistant(message.content.clone()));
                Ok(AgentMessage::Text(message.content))
            }
        }
    }

    fn receive_tool_result(&mut self, call: &ToolCall, output: &str) {
        self.context.push(Message::tool_result(&call.id, output));
    }
}
