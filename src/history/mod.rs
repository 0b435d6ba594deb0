//! Ordered, append-only conversation history with invariant checking.
//!
//! The history is the load-bearing structure of the tool-calling
//! protocol: assistant messages that request tools must precede their
//! answering tool messages, every request must be answered exactly once,
//! and the system prompt (if any) lives at index 0. [`History::append`]
//! validates before mutating, so a rejected append leaves the log
//! untouched.

use crate::error::{BuzzError, Result};
use crate::types::{Message, Role};

/// The ordered message log of one session.
#[derive(Debug, Clone, Default)]
pub struct History {
    messages: Vec<Message>,
    system_prompt: Option<String>,
    /// Ids issued by the most recent assistant message that are still
    /// awaiting a tool result, in request order.
    open_tool_calls: Vec<String>,
}

impl History {
    /// Create an empty history, seeding the system prompt if given.
    pub fn new(system_prompt: Option<String>) -> Self {
        let mut history = Self {
            messages: Vec::new(),
            system_prompt,
            open_tool_calls: Vec::new(),
        };
        if let Some(prompt) = history.system_prompt.clone() {
            history.messages.push(Message::system(prompt));
        }
        history
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    /// Ids of tool calls still awaiting results.
    pub fn open_tool_calls(&self) -> &[String] {
        &self.open_tool_calls
    }

    /// Append a message, validating the protocol invariants first.
    ///
    /// # Errors
    ///
    /// Returns [`BuzzError::ProtocolViolation`] if the message would
    /// break an invariant; the history is left unchanged.
    pub fn append(&mut self, message: Message) -> Result<()> {
        self.validate(&message)?;

        if message.role == Role::Assistant && !message.tool_calls.is_empty() {
            self.open_tool_calls = message.tool_calls.iter().map(|tc| tc.id.clone()).collect();
        }
        if message.role == Role::Tool {
            let id = message
                .tool_call_id
                .as_deref()
                .unwrap_or_default()
                .to_string();
            self.open_tool_calls.retain(|open| *open != id);
        }

        self.messages.push(message);
        Ok(())
    }

    fn validate(&self, message: &Message) -> Result<()> {
        match message.role {
            Role::System => {
                if !self.messages.is_empty() {
                    return Err(BuzzError::ProtocolViolation(
                        "system message only allowed at index 0".into(),
                    ));
                }
            }
            Role::User => {
                if !self.open_tool_calls.is_empty() {
                    return Err(BuzzError::ProtocolViolation(
                        "user message while tool calls are awaiting results".into(),
                    ));
                }
                if message.tool_call_id.is_some() || !message.tool_calls.is_empty() {
                    return Err(BuzzError::ProtocolViolation(
                        "user message must not carry tool fields".into(),
                    ));
                }
            }
            Role::Assistant => {
                if !self.open_tool_calls.is_empty() {
                    return Err(BuzzError::ProtocolViolation(
                        "assistant message while tool calls are awaiting results".into(),
                    ));
                }
                if message.tool_call_id.is_some() {
                    return Err(BuzzError::ProtocolViolation(
                        "assistant message must not carry a tool_call_id".into(),
                    ));
                }
                if message.content.is_empty() && message.tool_calls.is_empty() {
                    return Err(BuzzError::ProtocolViolation(
                        "assistant content may be empty only when requesting tool calls".into(),
                    ));
                }
                let mut seen: Vec<&str> = Vec::new();
                for call in &message.tool_calls {
                    if seen.contains(&call.id.as_str()) {
                        return Err(BuzzError::ProtocolViolation(format!(
                            "duplicate tool call id '{}' in assistant message",
                            call.id
                        )));
                    }
                    seen.push(&call.id);
                }
            }
            Role::Tool => {
                let Some(id) = message.tool_call_id.as_deref() else {
                    return Err(BuzzError::ProtocolViolation(
                        "tool message without tool_call_id".into(),
                    ));
                };
                if !self.open_tool_calls.iter().any(|open| open == id) {
                    return Err(BuzzError::ProtocolViolation(format!(
                        "tool message answers no open tool call (id '{id}')"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Ordered provider-agnostic view suitable for sending upstream.
    ///
    /// Diagnostics-only fields are stripped; content is always a plain
    /// (possibly empty) string, never null.
    pub fn snapshot_for_model(&self) -> Vec<Message> {
        self.messages
            .iter()
            .map(|m| Message {
                tool_name: None,
                ..m.clone()
            })
            .collect()
    }

    /// Atomically clear the history, optionally re-seeding the configured
    /// system prompt at index 0.
    pub fn reset(&mut self, preserve_system_prompt: bool) {
        self.messages.clear();
        self.open_tool_calls.clear();
        if preserve_system_prompt {
            if let Some(prompt) = self.system_prompt.clone() {
                self.messages.push(Message::system(prompt));
            }
        }
    }

    /// Export as line-delimited JSON, one message per line in history order.
    pub fn export_jsonl(&self) -> String {
        let mut out = String::new();
        for message in &self.messages {
            // Message serialization cannot fail: no non-string keys, no
            // non-finite floats.
            if let Ok(line) = serde_json::to_string(message) {
                out.push_str(&line);
                out.push('\n');
            }
        }
        out
    }

    /// Rebuild a history from its line-delimited JSON export.
    ///
    /// Blank lines are skipped. Every message is re-validated through
    /// [`append`](Self::append), so a corrupt export cannot construct an
    /// invariant-breaking history.
    pub fn import_jsonl(input: &str) -> Result<Self> {
        let mut history = Self::default();
        for line in input.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let message: Message = serde_json::from_str(line)?;
            if message.role == Role::System && history.is_empty() {
                history.system_prompt = Some(message.content.clone());
            }
            history.append(message)?;
        }
        Ok(history)
    }
}
