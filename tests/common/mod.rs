//! Shared fixtures: a scripted model, an in-memory catalog and a fake assistants API
#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use datacrew::agents::assistant::{AssistantsApi, RunState, ThreadMessage, ToolOutput};
use datacrew::agents::domain::{Message, ToolCall, ToolDefinition};
use datacrew::agents::error::LlmResult;
use datacrew::agents::llm::{CompletionRequest, CompletionResponse, FinishReason, LlmProvider};
use datacrew::db::{format_create_table, DbError, DbResult, SqlBackend};
use datacrew::pipeline::DataPipeline;
use serde_json::{json, Value};

pub const USERS_ROWS: &str = "[\n  {\n    \"id\": 1,\n    \"email\": \"ada@example.com\"\n  }\n]";

/// Plain-text model answer
pub fn text(content: &str) -> Message {
    Message::assistant(content)
}

/// Model answer that calls one function
pub fn call(name: &str, arguments: Value) -> Message {
    Message::assistant_with_tools("", vec![ToolCall::with_generated_id(name, arguments)])
}

pub fn run_sql(sql: &str) -> Message {
    call("run_sql", json!({ "sql": sql }))
}

/// Replays canned answers per agent, keyed by the agent's system prompt
///
/// Agents without a script, or whose script ran out, get `APPROVED`.
#[derive(Default)]
pub struct ScriptedProvider {
    scripts: Mutex<Vec<(String, VecDeque<Message>)>>,
    calls: Mutex<Vec<String>>,
    last_inputs: Mutex<Vec<(String, String)>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, system_prompt: &str, replies: Vec<Message>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), replies.into()));
        self
    }

    /// Number of completions requested by the agent with this system prompt
    pub fn calls_for(&self, system_prompt: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|prompt| prompt.as_str() == system_prompt)
            .count()
    }

    /// Latest non-system message of every request made by this agent
    pub fn inputs_for(&self, system_prompt: &str) -> Vec<String> {
        self.last_inputs
            .lock()
            .unwrap()
            .iter()
            .filter(|(prompt, _)| prompt.as_str() == system_prompt)
            .map(|(_, input)| input.clone())
            .collect()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn complete(&self, request: CompletionRequest) -> LlmResult<CompletionResponse> {
        let system = request
            .messages
            .first()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.calls.lock().unwrap().push(system.clone());
        let input = request
            .messages
            .iter()
            .skip(1)
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.last_inputs.lock().unwrap().push((system.clone(), input));

        let reply = self
            .scripts
            .lock()
            .unwrap()
            .iter_mut()
            .find(|(prompt, _)| *prompt == system)
            .and_then(|(_, replies)| replies.pop_front())
            .unwrap_or_else(|| text("APPROVED"));

        let finish_reason = if reply.tool_calls.is_some() {
            FinishReason::ToolCalls
        } else {
            FinishReason::Stop
        };

        Ok(CompletionResponse {
            message: reply,
            finish_reason,
            usage: None,
        })
    }
}

/// `users` and `orders`, linked by `orders.user_id`, plus an optional unrelated `jobs`
///
/// Any statement mentioning `userz` fails like a missing relation.
#[derive(Default)]
pub struct ShopBackend {
    executed: Mutex<Vec<String>>,
    with_jobs: bool,
}

impl ShopBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_jobs_table() -> Self {
        Self {
            with_jobs: true,
            ..Self::default()
        }
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    fn tables(&self) -> BTreeMap<&'static str, Vec<(&'static str, &'static str)>> {
        let mut tables = BTreeMap::from([
            (
                "users",
                vec![
                    ("id", "integer"),
                    ("email", "text"),
                    ("created", "timestamp without time zone"),
                ],
            ),
            (
                "orders",
                vec![("id", "integer"), ("user_id", "integer"), ("total", "numeric")],
            ),
        ]);
        if self.with_jobs {
            tables.insert("jobs", vec![("id", "integer"), ("status", "text")]);
        }
        tables
    }
}

#[async_trait]
impl SqlBackend for ShopBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn run_sql(&self, sql: &str) -> DbResult<String> {
        self.executed.lock().unwrap().push(sql.to_string());
        if sql.contains("userz") {
            return Err(DbError::Query(
                "relation \"userz\" does not exist".to_string(),
            ));
        }
        Ok(USERS_ROWS.to_string())
    }

    async fn table_names(&self) -> DbResult<Vec<String>> {
        Ok(self.tables().keys().map(|t| t.to_string()).collect())
    }

    async fn table_definition(&self, table: &str) -> DbResult<String> {
        let tables = self.tables();
        let columns = tables
            .get(table)
            .ok_or_else(|| DbError::Query(format!("relation \"{}\" does not exist", table)))?;
        let columns: Vec<(String, String)> = columns
            .iter()
            .map(|(name, ty)| (name.to_string(), ty.to_string()))
            .collect();
        Ok(format_create_table(table, &columns))
    }

    async fn related_tables(&self, tables: &[String], _n: usize) -> DbResult<Vec<String>> {
        let mut related = Vec::new();
        for table in tables {
            let other = match table.as_str() {
                "users" => "orders",
                "orders" => "users",
                _ => continue,
            };
            if !related.iter().any(|t: &String| t == other) {
                related.push(other.to_string());
            }
        }
        Ok(related)
    }
}

/// Backend whose catalog queries fail
pub struct DownBackend;

#[async_trait]
impl SqlBackend for DownBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn run_sql(&self, _sql: &str) -> DbResult<String> {
        Err(DbError::Connection("connection refused".to_string()))
    }

    async fn table_names(&self) -> DbResult<Vec<String>> {
        Err(DbError::Connection("connection refused".to_string()))
    }

    async fn table_definition(&self, _table: &str) -> DbResult<String> {
        Err(DbError::Connection("connection refused".to_string()))
    }

    async fn related_tables(&self, _tables: &[String], _n: usize) -> DbResult<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Hosted assistant that writes SQL on the first run and calls `run_sql` on the second
#[derive(Default)]
pub struct FakeAssistants {
    messages: Mutex<Vec<ThreadMessage>>,
    runs: AtomicUsize,
    polls: Mutex<VecDeque<RunState>>,
    pub submitted: Mutex<Vec<ToolOutput>>,
}

impl FakeAssistants {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, role: &str, text: &str) {
        let mut messages = self.messages.lock().unwrap();
        let created_at = 1_700_000_000 + messages.len() as i64;
        messages.push(ThreadMessage {
            role: role.to_string(),
            text: text.to_string(),
            created_at,
        });
    }
}

#[async_trait]
impl AssistantsApi for FakeAssistants {
    async fn get_or_create_assistant(&self, _name: &str, _model: &str) -> LlmResult<String> {
        Ok("asst_turbo4".to_string())
    }

    async fn set_instructions(&self, _assistant_id: &str, _instructions: &str) -> LlmResult<()> {
        Ok(())
    }

    async fn create_thread(&self) -> LlmResult<String> {
        Ok("thread_1".to_string())
    }

    async fn add_message(&self, _thread_id: &str, content: &str) -> LlmResult<()> {
        self.push("user", content);
        Ok(())
    }

    async fn create_run(
        &self,
        _thread_id: &str,
        _assistant_id: &str,
        _tools: Option<&[ToolDefinition]>,
    ) -> LlmResult<String> {
        let run = self.runs.fetch_add(1, Ordering::SeqCst);
        let mut polls = self.polls.lock().unwrap();
        if run == 0 {
            self.push("assistant", "SELECT id, email FROM users");
            polls.push_back(RunState::Completed);
        } else {
            polls.push_back(RunState::InProgress);
            polls.push_back(RunState::RequiresAction {
                tool_calls: vec![ToolCall::new(
                    "call_1",
                    "run_sql",
                    json!({ "sql": "SELECT id, email FROM users" }),
                )],
            });
            polls.push_back(RunState::Completed);
        }
        Ok(format!("run_{}", run))
    }

    async fn retrieve_run(&self, _thread_id: &str, _run_id: &str) -> LlmResult<RunState> {
        Ok(self
            .polls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(RunState::Completed))
    }

    async fn submit_tool_outputs(
        &self,
        _thread_id: &str,
        _run_id: &str,
        outputs: &[ToolOutput],
    ) -> LlmResult<()> {
        self.submitted.lock().unwrap().extend(outputs.iter().cloned());
        self.push("assistant", "The query ran successfully.");
        Ok(())
    }

    async fn list_messages(&self, _thread_id: &str) -> LlmResult<Vec<ThreadMessage>> {
        let mut messages = self.messages.lock().unwrap().clone();
        messages.reverse();
        Ok(messages)
    }
}

/// Pipeline over the shop catalog writing into `base_dir`
pub fn pipeline(
    provider: Arc<ScriptedProvider>,
    db: Arc<ShopBackend>,
    base_dir: &Path,
) -> DataPipeline {
    DataPipeline::new(provider, db, base_dir).unwrap()
}

/// The single session directory created under `base_dir`
pub fn session_dir(base_dir: &Path) -> std::path::PathBuf {
    let mut dirs: Vec<_> = std::fs::read_dir(base_dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.is_dir())
        .collect();
    assert_eq!(dirs.len(), 1, "expected one session directory");
    dirs.remove(0)
}
