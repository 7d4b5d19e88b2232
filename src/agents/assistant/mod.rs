//! Hosted assistant threads
//!
//! An alternative to multi-agent orchestration: a single hosted assistant
//! works through a thread. Each run is polled until it completes; when the
//! run asks for tool outputs, the calls are resolved against the local
//! [`Toolbox`] and the outputs submitted back.
//!
//! ```text
//! queued / in_progress ──poll──► requires_action ──submit outputs──► in_progress
//!          │                                                           │
//!          └──────────────────────────► completed ◄────────────────────┘
//! ```

mod openai;

pub use openai::OpenAiAssistantsApi;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::agents::domain::{AgentMessage, Chat, ToolCall, ToolDefinition};
use crate::agents::error::{AgentError, AgentResult, LlmError, LlmResult};
use crate::agents::orchestration::{TranscriptSink, ValidationOutcome};
use crate::agents::token::{CostEstimator, CostReport};
use crate::agents::tools::Toolbox;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_POLLS: usize = 600;

/// Status of a thread run
#[derive(Debug, Clone, PartialEq)]
pub enum RunState {
    Queued,
    InProgress,
    RequiresAction { tool_calls: Vec<ToolCall> },
    Completed,
    Failed(String),
    Cancelled,
    Expired,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Failed(_) | RunState::Cancelled | RunState::Expired
        )
    }
}

/// A message stored on a thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub role: String,
    pub text: String,
    /// Unix epoch seconds
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub output: String,
}

/// Hosted assistants endpoints the runner needs
#[async_trait]
pub trait AssistantsApi: Send + Sync {
    /// Id of the assistant called `name`, creating it or updating its model as needed
    async fn get_or_create_assistant(&self, name: &str, model: &str) -> LlmResult<String>;

    async fn set_instructions(&self, assistant_id: &str, instructions: &str) -> LlmResult<()>;

    async fn create_thread(&self) -> LlmResult<String>;

    async fn add_message(&self, thread_id: &str, content: &str) -> LlmResult<()>;

    /// Start a run; `tools` restricts the functions offered for this run
    async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
        tools: Option<&[ToolDefinition]>,
    ) -> LlmResult<String>;

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> LlmResult<RunState>;

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> LlmResult<()>;

    async fn list_messages(&self, thread_id: &str) -> LlmResult<Vec<ThreadMessage>>;
}

/// Drives one assistant through one thread
pub struct AssistantRunner {
    api: Arc<dyn AssistantsApi>,
    name: String,
    assistant_id: Option<String>,
    thread_id: Option<String>,
    toolbox: Toolbox,
    local_messages: Vec<String>,
    thread_messages: Vec<ThreadMessage>,
    poll_interval: Duration,
    max_polls: usize,
    cost: CostEstimator,
}

impl AssistantRunner {
    pub fn new(api: Arc<dyn AssistantsApi>, name: impl Into<String>, cost: CostEstimator) -> Self {
        Self {
            api,
            name: name.into(),
            assistant_id: None,
            thread_id: None,
            toolbox: Toolbox::new(),
            local_messages: Vec::new(),
            thread_messages: Vec::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
            cost,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_polls(mut self, max_polls: usize) -> Self {
        self.max_polls = max_polls.max(1);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn assistant_id(&self) -> AgentResult<&str> {
        self.assistant_id.as_deref().ok_or_else(|| {
            AgentError::Configuration(
                "No assistant has been created or retrieved. Call get_or_create_assistant() first."
                    .to_string(),
            )
        })
    }

    fn thread_id(&self) -> AgentResult<&str> {
        self.thread_id.as_deref().ok_or_else(|| {
            AgentError::Configuration(
                "No thread has been created. Call make_thread() first.".to_string(),
            )
        })
    }

    pub async fn get_or_create_assistant(&mut self, model: &str) -> AgentResult<()> {
        info!("get_or_create_assistant({}, {})", self.name, model);
        let id = self.api.get_or_create_assistant(&self.name, model).await?;
        self.assistant_id = Some(id);
        Ok(())
    }

    pub async fn set_instructions(&self, instructions: &str) -> AgentResult<()> {
        let assistant_id = self.assistant_id()?;
        self.api.set_instructions(assistant_id, instructions).await?;
        Ok(())
    }

    /// Tools the assistant may call during runs
    pub fn equip_tools(&mut self, toolbox: Toolbox) -> AgentResult<()> {
        self.assistant_id()?;
        self.toolbox = toolbox;
        Ok(())
    }

    pub async fn make_thread(&mut self) -> AgentResult<()> {
        self.assistant_id()?;
        let id = self.api.create_thread().await?;
        debug!("Created thread {}", id);
        self.thread_id = Some(id);
        self.thread_messages.clear();
        Ok(())
    }

    pub async fn add_message(&mut self, message: &str) -> AgentResult<()> {
        let thread_id = self.thread_id()?;
        self.api.add_message(thread_id, message).await?;
        self.local_messages.push(message.to_string());
        Ok(())
    }

    pub async fn load_messages(&mut self) -> AgentResult<()> {
        let thread_id = self.thread_id()?;
        self.thread_messages = self.api.list_messages(thread_id).await?;
        Ok(())
    }

    /// Run the thread to completion, optionally offering only the named tools
    pub async fn run_thread(&mut self, tool_names: Option<&[&str]>) -> AgentResult<()> {
        let thread_id = self.thread_id()?.to_string();
        let assistant_id = self.assistant_id()?.to_string();
        if self.local_messages.is_empty() {
            return Err(AgentError::Configuration(
                "No messages have been added to the thread.".to_string(),
            ));
        }

        let tools = match tool_names {
            Some(names) => Some(self.toolbox.subset(names)?.definitions()),
            None => None,
        };
        info!("run_thread({:?})", tool_names);

        self.load_messages().await?;
        let run_id = self
            .api
            .create_run(&thread_id, &assistant_id, tools.as_deref())
            .await?;

        for _ in 0..self.max_polls {
            match self.api.retrieve_run(&thread_id, &run_id).await? {
                RunState::RequiresAction { tool_calls } => {
                    let outputs = self.resolve_tool_calls(&tool_calls).await?;
                    self.api
                        .submit_tool_outputs(&thread_id, &run_id, &outputs)
                        .await?;
                }
                RunState::Completed => {
                    self.load_messages().await?;
                    return Ok(());
                }
                RunState::Failed(reason) => {
                    return Err(AgentError::Llm(LlmError::Api {
                        status: 500,
                        message: format!("Run {} failed: {}", run_id, reason),
                    }))
                }
                state @ (RunState::Cancelled | RunState::Expired) => {
                    return Err(AgentError::Llm(LlmError::InvalidRequest(format!(
                        "Run {} ended as {:?}",
                        run_id, state
                    ))))
                }
                RunState::Queued | RunState::InProgress => {}
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        Err(AgentError::Llm(LlmError::Timeout))
    }

    async fn resolve_tool_calls(&self, tool_calls: &[ToolCall]) -> AgentResult<Vec<ToolOutput>> {
        let mut outputs = Vec::with_capacity(tool_calls.len());
        for call in tool_calls {
            let tool = self
                .toolbox
                .get(&call.name)
                .ok_or_else(|| AgentError::ToolNotFound {
                    tool: call.name.clone(),
                    agent: self.name.clone(),
                })?;
            info!("run_thread() Calling {}({})", call.name, call.arguments);
            let output = tool.invoke(&call.arguments).await?;
            outputs.push(ToolOutput {
                tool_call_id: call.id.clone(),
                output,
            });
        }
        Ok(outputs)
    }

    /// Thread messages as transcript records, oldest first
    pub fn chat_messages(&self) -> Vec<Chat> {
        let mut chats: Vec<Chat> = self
            .thread_messages
            .iter()
            .map(|msg| {
                let to_name = if msg.role == "user" { "assistant" } else { "user" };
                Chat::new(
                    msg.role.clone(),
                    to_name,
                    AgentMessage::text(msg.text.clone()),
                    msg.created_at * 1000,
                )
            })
            .collect();
        chats.sort_by_key(|chat| chat.created);
        chats
    }

    pub fn cost_report(&self) -> CostReport {
        let texts: Vec<&str> = self.thread_messages.iter().map(|m| m.text.as_str()).collect();
        self.cost.estimate_messages(&texts)
    }

    pub fn run_validation(&self, validate: impl Fn() -> ValidationOutcome) -> ValidationOutcome {
        let outcome = validate();
        info!("run_validation(): success={}", outcome.success);
        outcome
    }

    /// Write the transcript and cost report under the assistant's name
    pub fn persist(&self, sink: &dyn TranscriptSink) -> AgentResult<CostReport> {
        let report = self.cost_report();
        sink.persist_chats(&self.name, &self.chat_messages())?;
        sink.persist_cost(&self.name, &report)?;
        Ok(report)
    }
}

#[cfg(test)]
mod assistant_test;
