//! OpenAI Assistants API client

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{AssistantsApi, RunState, ThreadMessage, ToolOutput};
use crate::agents::config::LlmProviderConfig;
use crate::agents::domain::{ToolCall, ToolDefinition};
use crate::agents::error::{LlmError, LlmResult};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiAssistantsApi {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
}

impl OpenAiAssistantsApi {
    pub fn new(config: &LlmProviderConfig) -> LlmResult<Self> {
        let api_key = env::var(&config.api_key_env).map_err(|_| {
            LlmError::Authentication(format!(
                "Environment variable {} not set",
                config.api_key_env
            ))
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key: SecretString::from(api_key),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header("OpenAI-Beta", "assistants=v2")
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> LlmResult<T> {
        let response = request.send().await?;
        let status = response.status();

        if status.as_u16() == 401 {
            return Err(LlmError::Authentication(
                response.text().await.unwrap_or_default(),
            ));
        }
        if !status.is_success() {
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| LlmError::Parse(format!("Failed to parse response: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct AssistantObject {
    id: String,
    #[serde(default)]
    name: Option<String>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct IdObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RunObject {
    status: String,
    #[serde(default)]
    required_action: Option<RequiredAction>,
    #[serde(default)]
    last_error: Option<RunError>,
}

#[derive(Debug, Deserialize)]
struct RequiredAction {
    submit_tool_outputs: SubmitToolOutputs,
}

#[derive(Debug, Deserialize)]
struct SubmitToolOutputs {
    tool_calls: Vec<RunToolCall>,
}

#[derive(Debug, Deserialize)]
struct RunToolCall {
    id: String,
    function: RunFunction,
}

#[derive(Debug, Deserialize)]
struct RunFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct RunError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct MessageObject {
    role: String,
    created_at: i64,
    #[serde(default)]
    content: Vec<Value>,
}

impl RunObject {
    fn into_state(self) -> RunState {
        match self.status.as_str() {
            "queued" => RunState::Queued,
            "in_progress" | "cancelling" => RunState::InProgress,
            "requires_action" => RunState::RequiresAction {
                tool_calls: self
                    .required_action
                    .map(|action| {
                        action
                            .submit_tool_outputs
                            .tool_calls
                            .into_iter()
                            .map(|call| {
                                let arguments = serde_json::from_str(&call.function.arguments)
                                    .unwrap_or(Value::String(call.function.arguments));
                                ToolCall::new(call.id, call.function.name, arguments)
                            })
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            "completed" => RunState::Completed,
            "cancelled" => RunState::Cancelled,
            "expired" => RunState::Expired,
            other => RunState::Failed(
                self.last_error
                    .map(|e| e.message)
                    .unwrap_or_else(|| other.to_string()),
            ),
        }
    }
}

impl MessageObject {
    /// Text of the first content part
    fn into_thread_message(self) -> ThreadMessage {
        let text = self
            .content
            .first()
            .and_then(|part| part.pointer("/text/value"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        ThreadMessage {
            role: self.role,
            text,
            created_at: self.created_at,
        }
    }
}

fn function_tools(tools: &[ToolDefinition]) -> Value {
    json!(tools
        .iter()
        .map(|t| json!({
            "type": "function",
            "function": {
                "name": t.name,
                "description": t.description,
                "parameters": t.parameters,
            }
        }))
        .collect::<Vec<_>>())
}

#[async_trait]
impl AssistantsApi for OpenAiAssistantsApi {
    async fn get_or_create_assistant(&self, name: &str, model: &str) -> LlmResult<String> {
        let assistants: ListResponse<AssistantObject> = self
            .send(self.request(Method::GET, "/assistants?limit=100"))
            .await?;

        if let Some(existing) = assistants
            .data
            .into_iter()
            .find(|a| a.name.as_deref() == Some(name))
        {
            if existing.model != model {
                tracing::info!(
                    "Updating assistant model from {} to {}",
                    existing.model,
                    model
                );
                let _: IdObject = self
                    .send(
                        self.request(Method::POST, &format!("/assistants/{}", existing.id))
                            .json(&json!({ "model": model })),
                    )
                    .await?;
            }
            return Ok(existing.id);
        }

        let created: IdObject = self
            .send(
                self.request(Method::POST, "/assistants")
                    .json(&json!({ "model": model, "name": name })),
            )
            .await?;
        Ok(created.id)
    }

    async fn set_instructions(&self, assistant_id: &str, instructions: &str) -> LlmResult<()> {
        let _: IdObject = self
            .send(
                self.request(Method::POST, &format!("/assistants/{}", assistant_id))
                    .json(&json!({ "instructions": instructions })),
            )
            .await?;
        Ok(())
    }

    async fn create_thread(&self) -> LlmResult<String> {
        let thread: IdObject = self
            .send(self.request(Method::POST, "/threads").json(&json!({})))
            .await?;
        Ok(thread.id)
    }

    async fn add_message(&self, thread_id: &str, content: &str) -> LlmResult<()> {
        let _: IdObject = self
            .send(
                self.request(Method::POST, &format!("/threads/{}/messages", thread_id))
                    .json(&json!({ "role": "user", "content": content })),
            )
            .await?;
        Ok(())
    }

    async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
        tools: Option<&[ToolDefinition]>,
    ) -> LlmResult<String> {
        let mut body = json!({ "assistant_id": assistant_id });
        if let Some(tools) = tools {
            body["tools"] = function_tools(tools);
        }

        let run: IdObject = self
            .send(
                self.request(Method::POST, &format!("/threads/{}/runs", thread_id))
                    .json(&body),
            )
            .await?;
        Ok(run.id)
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> LlmResult<RunState> {
        let run: RunObject = self
            .send(self.request(
                Method::GET,
                &format!("/threads/{}/runs/{}", thread_id, run_id),
            ))
            .await?;
        Ok(run.into_state())
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> LlmResult<()> {
        let _: IdObject = self
            .send(
                self.request(
                    Method::POST,
                    &format!("/threads/{}/runs/{}/submit_tool_outputs", thread_id, run_id),
                )
                .json(&json!({ "tool_outputs": outputs })),
            )
            .await?;
        Ok(())
    }

    async fn list_messages(&self, thread_id: &str) -> LlmResult<Vec<ThreadMessage>> {
        let messages: ListResponse<MessageObject> = self
            .send(self.request(
                Method::GET,
                &format!("/threads/{}/messages?limit=100", thread_id),
            ))
            .await?;
        Ok(messages
            .data
            .into_iter()
            .map(MessageObject::into_thread_message)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_action_parses_tool_calls() {
        let run: RunObject = serde_json::from_value(json!({
            "id": "run_1",
            "status": "requires_action",
            "required_action": {
                "type": "submit_tool_outputs",
                "submit_tool_outputs": {
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "run_sql", "arguments": "{\"sql\": \"SELECT 1\"}"}
                    }]
                }
            }
        }))
        .unwrap();

        match run.into_state() {
            RunState::RequiresAction { tool_calls } => {
                assert_eq!(tool_calls.len(), 1);
                assert_eq!(tool_calls[0].name, "run_sql");
                assert_eq!(tool_calls[0].arguments["sql"], "SELECT 1");
            }
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[test]
    fn test_run_statuses() {
        let state = |status: &str| {
            serde_json::from_value::<RunObject>(json!({ "status": status }))
                .unwrap()
                .into_state()
        };
        assert_eq!(state("queued"), RunState::Queued);
        assert_eq!(state("in_progress"), RunState::InProgress);
        assert_eq!(state("completed"), RunState::Completed);
        assert_eq!(state("expired"), RunState::Expired);
        assert_eq!(state("failed"), RunState::Failed("failed".to_string()));
    }

    #[test]
    fn test_message_text_extraction() {
        let message: MessageObject = serde_json::from_value(json!({
            "role": "assistant",
            "created_at": 1700000000,
            "content": [{"type": "text", "text": {"value": "SELECT 1", "annotations": []}}]
        }))
        .unwrap();
        let message = message.into_thread_message();
        assert_eq!(message.text, "SELECT 1");
        assert_eq!(message.created_at, 1700000000);
    }
}
