//! Multi-agent conversation orchestration
//!
//! An [`Orchestrator`] owns an ordered team of agents and drives message
//! exchange between them using one of three topologies:
//! - Sequential: each agent hands the running message to the next one
//! - Broadcast: the first agent sends the same prompt to every other agent
//! - Round-robin: agents take turns cyclically, restarting from the prompt each cycle
//!
//! Every hop is appended to the transcript and persisted right away. Function
//! calls emitted by a model are resolved against the acting agent's toolbox.
//! When the last turn completes, the validation hook scores the run.

mod broadcast;
mod round_robin;
mod self_correction;
mod sequential;
mod validation;


pub use self_correction::{SelfCorrectionController, SelfCorrectionRequest};
pub use validation::{
    always_valid, ConversationPolicy, TerminationMode, ValidationHook, ValidationOutcome,
};

use std::sync::Arc;

use tracing::{info, warn};

use crate::agents::core::Agent;
use crate::agents::domain::{AgentMessage, Chat, ChatClock, ConversationResult, ToolCall, ToolFailure};
use crate::agents::error::{AgentError, AgentResult};
use crate::agents::token::{CostEstimator, CostReport, DEFAULT_PRICE_PER_1K_TOKENS};

/// Destination for transcripts and cost reports
pub trait TranscriptSink: Send + Sync {
    /// Overwrite the stored transcript of a team
    fn persist_chats(&self, team: &str, chats: &[Chat]) -> AgentResult<()>;

    /// Overwrite the stored cost report of a team
    fn persist_cost(&self, team: &str, report: &CostReport) -> AgentResult<()>;
}

/// Conversation topology
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationProtocol {
    Sequential,
    Broadcast,
    RoundRobin { loops: usize },
}

/// Sequences a team of agents through a conversation
pub struct Orchestrator {
    name: String,
    agents: Vec<Box<dyn Agent>>,
    messages: Vec<AgentMessage>,
    chats: Vec<Chat>,
    clock: ChatClock,
    validation: ValidationHook,
    policy: ConversationPolicy,
    sink: Option<Arc<dyn TranscriptSink>>,
    cost: CostEstimator,
    last_failure: Option<ToolFailure>,
}

impl Orchestrator {
    /// Create an orchestrator; a team needs at least two agents
    pub fn new(
        name: impl Into<String>,
        agents: Vec<Box<dyn Agent>>,
        validation: ValidationHook,
    ) -> AgentResult<Self> {
        if agents.len() < 2 {
            return Err(AgentError::InsufficientAgents(agents.len()));
        }

        Ok(Self {
            name: name.into(),
            agents,
            messages: Vec::new(),
            chats: Vec::new(),
            clock: ChatClock::new(),
            validation,
            policy: ConversationPolicy::default(),
            sink: None,
            cost: CostEstimator::with_price(DEFAULT_PRICE_PER_1K_TOKENS)?,
            last_failure: None,
        })
    }

    pub fn with_policy(mut self, policy: ConversationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn TranscriptSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_cost_estimator(mut self, cost: CostEstimator) -> Self {
        self.cost = cost;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn total_agents(&self) -> usize {
        self.agents.len()
    }

    pub fn agents(&self) -> &[Box<dyn Agent>] {
        &self.agents
    }

    /// Hand the agents back so they can join another orchestrator
    pub fn into_agents(self) -> Vec<Box<dyn Agent>> {
        self.agents
    }

    /// Running message history, oldest first
    pub fn messages(&self) -> &[AgentMessage] {
        &self.messages
    }

    /// Transcript of every hop, oldest first
    pub fn chats(&self) -> &[Chat] {
        &self.chats
    }

    pub fn latest_message(&self) -> Option<&AgentMessage> {
        self.messages.last()
    }

    pub fn last_message_str(&self) -> String {
        self.latest_message().map(AgentMessage::render).unwrap_or_default()
    }

    /// Run a conversation with the given topology
    pub async fn run(
        &mut self,
        protocol: ConversationProtocol,
        prompt: &str,
    ) -> AgentResult<ConversationResult> {
        match protocol {
            ConversationProtocol::Sequential => self.sequential_conversation(prompt).await,
            ConversationProtocol::Broadcast => self.broadcast_conversation(prompt).await,
            ConversationProtocol::RoundRobin { loops } => {
                self.round_robin_conversation(prompt, loops).await
            }
        }
    }

    pub fn add_message(&mut self, message: AgentMessage) {
        self.messages.push(message);
    }

    fn agent_name(&self, idx: usize) -> AgentResult<String> {
        self.agents
            .get(idx)
            .map(|agent| agent.name().to_string())
            .ok_or_else(|| {
                AgentError::Internal(format!(
                    "Agent index {} out of range for team '{}'",
                    idx, self.name
                ))
            })
    }

    fn record(&mut self, from: &str, to: &str, message: AgentMessage) {
        let created = self.clock.tick();
        self.chats.push(Chat::new(from, to, message, created));
        self.persist();
    }

    /// Deliver `message` from agent `a` to agent `b` and append b's reply
    pub async fn basic_chat(&mut self, a: usize, b: usize, message: AgentMessage) -> AgentResult<()> {
        let a_name = self.agent_name(a)?;
        let b_name = self.agent_name(b)?;
        info!("basic_chat(): {} -> {}", a_name, b_name);

        self.record(&a_name, &b_name, message.clone());
        self.agents[b].receive(&message, &a_name);

        let reply = self.agents[b].reply(&a_name).await?;
        self.add_message(reply.clone());
        self.record(&b_name, &a_name, reply);
        Ok(())
    }

    /// Like [`Orchestrator::basic_chat`], but b also sends its reply to itself
    pub async fn memory_chat(&mut self, a: usize, b: usize, message: AgentMessage) -> AgentResult<()> {
        self.basic_chat(a, b, message).await?;

        let b_name = self.agent_name(b)?;
        if let Some(reply) = self.latest_message().cloned() {
            self.agents[b].receive(&reply, &b_name);
            self.record(&b_name, &b_name, reply);
        }
        Ok(())
    }

    /// Run a function call from agent `idx` against its own toolbox
    ///
    /// The tool output becomes the next message. Fails before anything is
    /// recorded when the tool is not registered.
    pub async fn execute_call(&mut self, idx: usize, call: &ToolCall) -> AgentResult<String> {
        let agent_name = self.agent_name(idx)?;
        let tool = self.agents[idx]
            .toolbox()
            .and_then(|toolbox| toolbox.get(&call.name))
            .cloned()
            .ok_or_else(|| AgentError::ToolNotFound {
                tool: call.name.clone(),
                agent: agent_name.clone(),
            })?;

        info!("function_call(): {} -> {}()", agent_name, call.name);
        self.record(&agent_name, &agent_name, AgentMessage::function_call(call.clone()));

        match tool.invoke(&call.arguments).await {
            Ok(output) => {
                self.agents[idx].receive_tool_result(call, &output);
                let message = AgentMessage::text(output.clone());
                self.add_message(message.clone());
                self.record(&agent_name, &agent_name, message);
                Ok(output)
            }
            Err(err) => {
                let error = match err {
                    AgentError::ToolExecution { message, .. } => message,
                    other => other.to_string(),
                };
                warn!("Tool '{}' failed for {}: {}", call.name, agent_name, error);
                self.agents[idx].receive_tool_result(call, &format!("Error: {}", error));
                self.last_failure = Some(ToolFailure {
                    tool: call.name.clone(),
                    arguments: call.arguments.clone(),
                    error: error.clone(),
                });
                Err(AgentError::ToolExecution {
                    tool: call.name.clone(),
                    message: error,
                })
            }
        }
    }

    /// Agent `a` runs its tool, then sends the output on to agent `b`
    pub async fn function_chat(&mut self, a: usize, b: usize, call: ToolCall) -> AgentResult<()> {
        let output = self.execute_call(a, &call).await?;
        self.basic_chat(a, b, AgentMessage::text(output)).await
    }

    /// One hop from `a` to `b` carrying the latest message
    async fn hop(&mut self, a: usize, b: usize) -> AgentResult<()> {
        let latest = self
            .latest_message()
            .cloned()
            .ok_or_else(|| AgentError::Internal("Conversation has no messages".to_string()))?;

        match latest {
            AgentMessage::FunctionCall { function_call } if self.agents[a].has_tools() => {
                self.function_chat(a, b, function_call).await
            }
            message => self.basic_chat(a, b, message).await,
        }
    }

    /// Write the current transcript to the sink; failures are logged, not raised
    pub fn persist(&self) {
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.persist_chats(&self.name, &self.chats) {
                warn!("Failed to persist transcript for {}: {}", self.name, e);
            }
        }
    }

    /// Run the validation hook directly
    pub fn validate(&self) -> ValidationOutcome {
        (self.validation)()
    }

    /// Token and cost estimate of the message history
    pub fn cost_report(&self) -> CostReport {
        let rendered: Vec<String> = self.messages.iter().map(AgentMessage::render).collect();
        self.cost.estimate_messages(&rendered)
    }

    /// Build the final result for an outcome and persist transcript and cost
    pub fn summarize(&mut self, outcome: ValidationOutcome) -> ConversationResult {
        let report = self.cost_report();
        self.persist();
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.persist_cost(&self.name, &report) {
                warn!("Failed to persist cost for {}: {}", self.name, e);
            }
        }

        if outcome.success {
            info!("✅ Orchestrator was successful. Team: {}", self.name);
        } else {
            info!(
                "❌ Orchestrator failed. Team: {} ({})",
                self.name,
                outcome.error_message.as_deref().unwrap_or("no reason given")
            );
        }
        info!("{} cost: {}, tokens: {}", self.name, report.cost, report.tokens);

        ConversationResult {
            success: outcome.success,
            messages: self.chats.clone(),
            cost: report.cost,
            tokens: report.tokens,
            last_message_str: self.last_message_str(),
            error_message: outcome.error_message,
            tool_failure: self.last_failure.take(),
        }
    }

    /// Turn the outcome of a protocol's turns into a result
    ///
    /// Tool execution failures become a failed result without calling the
    /// validation hook; every other error is returned.
    fn conclude(&mut self, turns: AgentResult<()>) -> AgentResult<ConversationResult> {
        match turns {
            Ok(()) => {
                info!("-------- {} Orchestrator Complete --------", self.name);
                let outcome = self.policy.decide(&self.validation, &self.last_message_str());
                Ok(self.summarize(outcome))
            }
            Err(err @ AgentError::ToolExecution { .. }) => {
                let outcome = ValidationOutcome::failed(err.to_string());
                Ok(self.summarize(outcome))
            }
            Err(err) => {
                self.persist();
                Err(err)
            }
        }
    }
}
