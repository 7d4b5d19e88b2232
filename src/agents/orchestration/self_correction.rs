//! Diagnose, regenerate and retry a failing SQL query

use tracing::{info, warn};

use super::{Orchestrator, ValidationOutcome};
use crate::agents::domain::{AgentMessage, ConversationResult};
use crate::agents::error::{AgentError, AgentResult};

/// The failure a correction run starts from
#[derive(Debug, Clone)]
pub struct SelfCorrectionRequest {
    pub failing_sql: String,
    pub error: String,
    /// Every table definition known for the session, as CREATE TABLE text
    pub table_definitions: String,
}

/// Bounded diagnose → regenerate → execute loop over a two-agent team
///
/// Agent 0 drives the exchange and agent 1 must own the `run_sql` tool.
#[derive(Debug, Clone, Copy)]
pub struct SelfCorrectionController {
    max_attempts: usize,
}

impl Default for SelfCorrectionController {
    fn default() -> Self {
        Self { max_attempts: 1 }
    }
}

impl SelfCorrectionController {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub async fn run(
        &self,
        orchestrator: &mut Orchestrator,
        request: SelfCorrectionRequest,
    ) -> AgentResult<ConversationResult> {
        if !orchestrator.agents[1].has_tools() {
            return Err(AgentError::Configuration(format!(
                "Agent '{}' needs the run_sql tool to correct queries",
                orchestrator.agents[1].name()
            )));
        }

        let mut failing_sql = request.failing_sql;
        let mut last_error = request.error;

        for attempt in 1..=self.max_attempts {
            info!(
                "Self-correction attempt {}/{} for {}",
                attempt,
                self.max_attempts,
                orchestrator.name()
            );

            let diagnose = diagnose_prompt(&failing_sql, &last_error, &request.table_definitions);
            let steps = [diagnose.as_str(), REGENERATE_PROMPT, EXECUTE_PROMPT];
            let mut called = false;

            for step in steps {
                send(orchestrator, step).await?;

                let pending = orchestrator
                    .latest_message()
                    .and_then(AgentMessage::as_function_call)
                    .cloned();
                if let Some(call) = pending {
                    called = true;
                    match orchestrator.execute_call(1, &call).await {
                        Ok(_) => {}
                        Err(AgentError::ToolExecution { message, .. }) => {
                            warn!("Corrected query failed again: {}", message);
                            failing_sql = call.string_argument("sql").unwrap_or(failing_sql);
                            last_error = message;
                        }
                        Err(other) => return Err(other),
                    }
                }

                if let Some(result) = checkpoint(orchestrator) {
                    return Ok(result);
                }
            }

            if !called {
                last_error = "Agent did not call run_sql with a corrected query".to_string();
            }
        }

        Ok(orchestrator.summarize(ValidationOutcome::failed(last_error)))
    }
}

/// Admin sends `text` to the analyst; the prompt counts towards the run's cost
async fn send(orchestrator: &mut Orchestrator, text: &str) -> AgentResult<()> {
    let message = AgentMessage::text(text);
    orchestrator.add_message(message.clone());
    orchestrator.basic_chat(0, 1, message).await
}

const REGENERATE_PROMPT: &str =
    "Based on your diagnosis, write a corrected SQL query that fulfills the original request. Respond with the SQL only.";

const EXECUTE_PROMPT: &str = "Run the corrected SQL query now using the run_sql function.";

fn diagnose_prompt(failing_sql: &str, error: &str, table_definitions: &str) -> String {
    format!(
        "This SQL query failed.\n\nSQL:\n{}\n\nERROR:\n{}\n\nTABLE_DEFINITIONS:\n\n{}\n\nExplain why the query failed.",
        failing_sql, error, table_definitions
    )
}

/// Persist, then stop with a successful result once validation passes
fn checkpoint(orchestrator: &mut Orchestrator) -> Option<ConversationResult> {
    orchestrator.persist();
    let outcome = orchestrator.validate();
    if outcome.success {
        Some(orchestrator.summarize(outcome))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempts_are_at_least_one() {
        assert_eq!(SelfCorrectionController::new(0).max_attempts(), 1);
        assert_eq!(SelfCorrectionController::new(3).max_attempts(), 3);
        assert_eq!(SelfCorrectionController::default().max_attempts(), 1);
    }

    #[test]
    fn test_diagnose_prompt_carries_failure() {
        let prompt = diagnose_prompt(
            "SELECT * FROM userz",
            "relation \"userz\" does not exist",
            "CREATE TABLE users (\nid integer\n);",
        );
        assert!(prompt.contains("SELECT * FROM userz"));
        assert!(prompt.contains("does not exist"));
        assert!(prompt.contains("CREATE TABLE users"));
    }
}
