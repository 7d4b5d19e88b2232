//! Domain types for the agent system
//!
//! Messages exchanged between agents, transcript records, tool calls and
//! conversation outcomes.

mod agent;
mod message;
mod result;
mod tool_call;

pub use agent::*;
pub use message::*;
pub use result::*;
pub use tool_call::*;
