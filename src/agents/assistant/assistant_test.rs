use std::collections::VecDeque;
use std::sync::Mutex;

use serde_json::{json, Value};

use super::*;
use crate::agents::token::DEFAULT_PRICE_PER_1K_TOKENS;
use crate::agents::tools::{FnTool, ToolDescriptor};

/// Replays run states and records submitted outputs
#[derive(Default)]
struct FakeAssistants {
    states: Mutex<VecDeque<RunState>>,
    submitted: Mutex<Vec<ToolOutput>>,
    run_tools: Mutex<Vec<Option<Vec<String>>>>,
    messages: Mutex<Vec<ThreadMessage>>,
}

#[async_trait]
impl AssistantsApi for FakeAssistants {
    async fn get_or_create_assistant(&self, _name: &str, _model: &str) -> LlmResult<String> {
        Ok("asst_1".to_string())
    }

    async fn set_instructions(&self, _assistant_id: &str, _instructions: &str) -> LlmResult<()> {
        Ok(())
    }

    async fn create_thread(&self) -> LlmResult<String> {
        Ok("thread_1".to_string())
    }

    async fn add_message(&self, _thread_id: &str, content: &str) -> LlmResult<()> {
        let mut messages = self.messages.lock().unwrap();
        let created_at = 1_700_000_000 + messages.len() as i64;
        messages.push(ThreadMessage {
            role: "user".to_string(),
            text: content.to_string(),
            created_at,
        });
        Ok(())
    }

    async fn create_run(
        &self,
        _thread_id: &str,
        _assistant_id: &str,
        tools: Option<&[ToolDefinition]>,
    ) -> LlmResult<String> {
        self.run_tools
            .lock()
            .unwrap()
            .push(tools.map(|t| t.iter().map(|d| d.name.clone()).collect()));
        Ok("run_1".to_string())
    }

    async fn retrieve_run(&self, _thread_id: &str, _run_id: &str) -> LlmResult<RunState> {
        Ok(self
            .states
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
        Ok(())
    }

    async fn list_messages(&self, _thread_id: &str) -> LlmResult<Vec<ThreadMessage>> {
        // newest first, like the hosted API
        let mut messages = self.messages.lock().unwrap().clone();
        messages.reverse();
        Ok(messages)
    }
}

fn runner(api: Arc<FakeAssistants>) -> AssistantRunner {
    AssistantRunner::new(
        api,
        "Turbo4",
        CostEstimator::with_price(DEFAULT_PRICE_PER_1K_TOKENS).unwrap(),
    )
    .with_poll_interval(Duration::from_millis(1))
}

fn sql_toolbox() -> Toolbox {
    Toolbox::new()
        .with(ToolDescriptor::new(
            ToolDefinition::new("run_sql", "Run SQL", json!({"type": "object"})),
            Arc::new(FnTool(|args: &Value| {
                Ok(format!("ran {}", args["sql"].as_str().unwrap_or_default()))
            })),
        ))
        .unwrap()
}

#[tokio::test]
async fn test_run_requires_thread_and_message() {
    let api = Arc::new(FakeAssistants::default());
    let mut runner = runner(api);

    assert!(matches!(
        runner.make_thread().await,
        Err(AgentError::Configuration(_))
    ));

    runner.get_or_create_assistant("gpt-4-1106-preview").await.unwrap();
    assert!(runner.run_thread(None).await.is_err());

    runner.make_thread().await.unwrap();
    let err = runner.run_thread(None).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Configuration error: No messages have been added to the thread."
    );
}

#[tokio::test]
async fn test_tool_calls_are_resolved_and_submitted() {
    let api = Arc::new(FakeAssistants::default());
    api.states.lock().unwrap().extend([
        RunState::Queued,
        RunState::RequiresAction {
            tool_calls: vec![ToolCall::new("call_7", "run_sql", json!({"sql": "SELECT 1"}))],
        },
        RunState::InProgress,
        RunState::Completed,
    ]);

    let mut runner = runner(api.clone());
    runner.get_or_create_assistant("gpt-4-1106-preview").await.unwrap();
    runner.equip_tools(sql_toolbox()).unwrap();
    runner.make_thread().await.unwrap();
    runner.add_message("Use the run_sql function.").await.unwrap();
    runner.run_thread(Some(&["run_sql"][..])).await.unwrap();

    let submitted = api.submitted.lock().unwrap();
    assert_eq!(
        *submitted,
        vec![ToolOutput {
            tool_call_id: "call_7".to_string(),
            output: "ran SELECT 1".to_string(),
        }]
    );
    assert_eq!(
        api.run_tools.lock().unwrap()[0],
        Some(vec!["run_sql".to_string()])
    );
}

#[tokio::test]
async fn test_unknown_tool_name_rejected_before_run() {
    let api = Arc::new(FakeAssistants::default());
    let mut runner = runner(api.clone());
    runner.get_or_create_assistant("gpt-4").await.unwrap();
    runner.equip_tools(sql_toolbox()).unwrap();
    runner.make_thread().await.unwrap();
    runner.add_message("hi").await.unwrap();

    assert!(runner.run_thread(Some(&["store_fact"][..])).await.is_err());
    assert!(api.run_tools.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_polling_gives_up() {
    let api = Arc::new(FakeAssistants::default());
    api.states
        .lock()
        .unwrap()
        .extend(std::iter::repeat(RunState::InProgress).take(10));

    let mut runner = runner(api).with_max_polls(3);
    runner.get_or_create_assistant("gpt-4").await.unwrap();
    runner.make_thread().await.unwrap();
    runner.add_message("hi").await.unwrap();

    let err = runner.run_thread(None).await.unwrap_err();
    assert!(matches!(err, AgentError::Llm(LlmError::Timeout)));
}

#[tokio::test]
async fn test_chat_messages_sorted_oldest_first() {
    let api = Arc::new(FakeAssistants::default());
    let mut runner = runner(api);
    runner.get_or_create_assistant("gpt-4").await.unwrap();
    runner.make_thread().await.unwrap();
    runner.add_message("first").await.unwrap();
    runner.add_message("second").await.unwrap();
    runner.run_thread(None).await.unwrap();

    let chats = runner.chat_messages();
    assert_eq!(chats.len(), 2);
    assert_eq!(chats[0].message.render(), "first");
    assert_eq!(chats[0].from_name, "user");
    assert_eq!(chats[0].to_name, "assistant");
    assert!(chats[0].created < chats[1].created);
    assert!(runner.cost_report().tokens > 0);
}
