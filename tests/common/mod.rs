//! Shared test support: a scripted model client.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use buzzcore::client::{ModelClient, ModelReply};
use buzzcore::error::{BuzzError, Result};
use buzzcore::tools::ToolDefinition;
use buzzcore::types::{Message, ToolCallRequest};

/// One recorded upstream invocation.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub messages: Vec<Message>,
    pub tooled: bool,
}

/// A [`ModelClient`] that replays a fixed script of replies and records
/// every invocation it receives.
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Result<ModelReply>>>,
    calls: Mutex<Vec<RecordedCall>>,
    delay: Option<Duration>,
}

impl ScriptedClient {
    pub fn new(replies: Vec<Result<ModelReply>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Sleep before answering, to widen race windows in concurrency tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    async fn invoke(
        &self,
        model: &str,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ModelReply> {
        self.calls.lock().unwrap().push(RecordedCall {
            model: model.to_string(),
            messages: messages.to_vec(),
            tooled: tools.is_some(),
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("scripted client ran out of replies"))
    }
}

pub fn content(text: &str) -> Result<ModelReply> {
    Ok(ModelReply::Content(text.to_string()))
}

pub fn tool_calls(calls: &[(&str, &str, &str)]) -> Result<ModelReply> {
    Ok(ModelReply::ToolCalls {
        content: String::new(),
        calls: calls
            .iter()
            .map(|(id, name, args)| ToolCallRequest::new(*id, *name, *args))
            .collect(),
    })
}

pub fn adapter_failure() -> Result<ModelReply> {
    Err(BuzzError::Timeout(100))
}
