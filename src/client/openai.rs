//! OpenAI Chat Completions implementation of [`ModelClient`].

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::http::{bearer_headers, shared_client, status_to_error};
use super::{ModelClient, ModelReply};
use crate::config::AppConfig;
use crate::error::{BuzzError, Result};
use crate::tools::ToolDefinition;
use crate::types::{Message, Role, ToolCallRequest};
use crate::util::{with_timeout, RetryPolicy};

/// Client for the OpenAI chat-completions wire protocol.
///
/// Each round-trip is bounded by the configured request timeout;
/// transient failures are retried per [`RetryPolicy`]. Retry is a
/// provider-level concern — the conversation engine never retries.
pub struct OpenAiClient {
    api_key: String,
    base_url: String,
    request_timeout: std::time::Duration,
    retry: RetryPolicy,
}

impl OpenAiClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            request_timeout: config.request_timeout,
            retry: RetryPolicy::default(),
        }
    }

    /// Override the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn build_request_body(
        &self,
        model: &str,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> serde_json::Value {
        let messages = messages.iter().map(message_to_wire).collect::<Vec<_>>();

        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
        });

        if let Some(tools) = tools {
            if !tools.is_empty() {
                let tool_defs: Vec<serde_json::Value> = tools
                    .iter()
                    .map(|t| {
                        serde_json::json!({
                            "type": "function",
                            "function": {
                                "name": t.name,
                                "description": t.description,
                                "parameters": t.parameters,
                            }
                        })
                    })
                    .collect();
                let obj = body.as_object_mut().expect("body is an object");
                obj.insert("tools".into(), tool_defs.into());
                obj.insert("tool_choice".into(), "auto".into());
            }
        }

        body
    }

    async fn send_once(&self, body: &serde_json::Value) -> Result<ModelReply> {
        let url = format!("{}/chat/completions", self.base_url);

        let resp = shared_client()
            .post(&url)
            .headers(bearer_headers(&self.api_key))
            .json(body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        let data: WireChatResponse = resp.json().await?;
        let choice = data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| BuzzError::api(200, "No choices in chat completion response"))?;

        let content = choice.message.content.unwrap_or_default();
        let calls: Vec<ToolCallRequest> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .filter(|tc| tc.kind == "function")
            .map(|tc| ToolCallRequest::new(tc.id, tc.function.name, tc.function.arguments))
            .collect();

        if calls.is_empty() {
            Ok(ModelReply::Content(content))
        } else {
            Ok(ModelReply::ToolCalls { content, calls })
        }
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    async fn invoke(
        &self,
        model: &str,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ModelReply> {
        let body = self.build_request_body(model, messages, tools);
        debug!(model, tooled = tools.is_some(), "chat completion request");

        self.retry
            .execute(|| with_timeout(self.request_timeout, self.send_once(&body)))
            .await
    }
}

/// Encode a history message into the provider wire shape.
fn message_to_wire(msg: &Message) -> serde_json::Value {
    match msg.role {
        Role::Tool => serde_json::json!({
            "role": "tool",
            "tool_call_id": msg.tool_call_id,
            "content": msg.content,
        }),
        Role::Assistant if !msg.tool_calls.is_empty() => {
            let calls: Vec<serde_json::Value> = msg
                .tool_calls
                .iter()
                .map(|tc| {
                    serde_json::json!({
                        "id": tc.id,
                        "type": "function",
                        "function": {
                            "name": tc.name,
                            "arguments": tc.arguments,
                        }
                    })
                })
                .collect();
            serde_json::json!({
                "role": "assistant",
                "content": msg.content,
                "tool_calls": calls,
            })
        }
        Role::System => serde_json::json!({ "role": "system", "content": msg.content }),
        Role::User => serde_json::json!({ "role": "user", "content": msg.content }),
        Role::Assistant => serde_json::json!({ "role": "assistant", "content": msg.content }),
    }
}

#[derive(Deserialize)]
struct WireChatResponse {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Deserialize)]
struct WireMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}
