//! Agent domain types

use serde::{Deserialize, Serialize};

/// Role an agent plays inside a team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Human proxy that opens conversations; never a tool target
    Admin,
    /// Rates whether a prompt is a database question
    Gatekeeper,
    /// Produces SQL or insights from a prompt
    Generator,
    /// Runs queries through tools
    Executor,
    /// Writes reports through tools
    Reporter,
    /// Reviews failed work and reruns the fix through tools
    Validator,
}

impl AgentRole {
    /// Whether agents in this role are expected to carry a toolbox
    pub fn uses_tools(&self) -> bool {
        matches!(
            self,
            AgentRole::Executor | AgentRole::Reporter | AgentRole::Validator
        )
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentRole::Admin => write!(f, "admin"),
            AgentRole::Gatekeeper => write!(f, "gatekeeper"),
            AgentRole::Generator => write!(f, "generator"),
            AgentRole::Executor => write!(f, "executor"),
            AgentRole::Reporter => write!(f, "reporter"),
            AgentRole::Validator => write!(f, "validator"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_capabilities() {
        assert!(AgentRole::Executor.uses_tools());
        assert!(AgentRole::Reporter.uses_tools());
        assert!(!AgentRole::Generator.uses_tools());
        assert!(AgentRole::Validator.uses_tools());
        assert!(!AgentRole::Admin.uses_tools());
        assert!(!AgentRole::Gatekeeper.uses_tools());
    }

    #[test]
    fn test_role_serde() {
        let role: AgentRole = serde_json::from_str("\"gatekeeper\"").unwrap();
        assert_eq!(role, AgentRole::Gatekeeper);
        assert_eq!(AgentRole::Reporter.to_string(), "reporter");
    }
}
