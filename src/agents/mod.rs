//! Multi-agent conversation engine
//!
//! ## Architecture
//!
//! - `domain/` - Messages, transcript records, tool calls, conversation results
//! - `llm/` - Chat-completions provider with tool calling
//! - `core/` - Agent implementations (model-backed, human proxy, gatekeeper)
//! - `tools/` - Tool descriptors and per-agent toolboxes
//! - `orchestration/` - Sequential, broadcast and round-robin conversations, self-correction
//! - `teams/` - Named teams and their prompts
//! - `assistant/` - Hosted assistant thread runner
//! - `token/` - Token counting and cost estimation

pub mod assistant;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod llm;
pub mod orchestration;
pub mod teams;
pub mod token;
pub mod tools;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use orchestration::{ConversationProtocol, Orchestrator, ValidationOutcome};
