//! Conversation engine: the tool-calling state machine.
//!
//! One [`ChatEngine`] owns one [`History`] and turns one user utterance
//! into one final assistant message, possibly executing several tool
//! calls and model round-trips in between. [`ChatEngine::complete`] is
//! total: every failure path degrades into a message recorded in the
//! history, so the caller always gets an assistant [`Message`] back.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::client::{ModelClient, ModelReply};
use crate::history::History;
use crate::tools::{ToolExecutionContext, ToolRegistry};
use crate::types::Message;

/// Upper bound on model round-trips within one `complete` call.
///
/// A model that perpetually requests tools would otherwise loop forever;
/// on exhaustion the engine forces a tool-free finalization.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 8;

/// Per-session conversation engine.
pub struct ChatEngine {
    model: String,
    history: History,
    tools: Arc<ToolRegistry>,
    client: Arc<dyn ModelClient>,
    max_tool_rounds: usize,
    session_id: Option<String>,
}

impl ChatEngine {
    /// Create an engine with a fresh history, seeded with the system
    /// prompt if given.
    pub fn new(
        client: Arc<dyn ModelClient>,
        tools: Arc<ToolRegistry>,
        model: impl Into<String>,
        system_prompt: Option<String>,
    ) -> Self {
        Self {
            model: model.into(),
            history: History::new(system_prompt),
            tools,
            client,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            session_id: None,
        }
    }

    /// Create an engine over an existing (e.g., imported) history.
    pub fn with_history(
        client: Arc<dyn ModelClient>,
        tools: Arc<ToolRegistry>,
        model: impl Into<String>,
        history: History,
    ) -> Self {
        Self {
            model: model.into(),
            history,
            tools,
            client,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            session_id: None,
        }
    }

    /// Override the tool round bound.
    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds.max(1);
        self
    }

    /// Tag the engine with its owning session id (passed to tools).
    pub fn with_session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Switch the model used for subsequent completions.
    pub fn switch_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    /// Clear the history, optionally re-seeding the system prompt.
    pub fn reset(&mut self, preserve_system_prompt: bool) {
        self.history.reset(preserve_system_prompt);
    }

    /// Run one full conversation turn and return the final assistant
    /// message.
    ///
    /// Appends the user message, then loops: invoke the model with the
    /// tool manifest; execute any requested tools and feed the results
    /// back; stop on the first plain-text reply. Adapter failures and an
    /// exhausted round budget both degrade to a tool-free completion.
    /// Never fails — errors become messages in the history.
    pub async fn complete(&mut self, user_content: impl Into<String>) -> Message {
        if let Err(e) = self.history.append(Message::user(user_content)) {
            return self.record_failure(e.to_string());
        }

        // Nothing registered: the tooled phase would be a no-op upstream.
        if self.tools.is_empty() {
            return self.plain_completion().await;
        }

        for round in 0..self.max_tool_rounds {
            let snapshot = self.history.snapshot_for_model();
            debug!(round, model = %self.model, "tooled model round-trip");

            let reply = self
                .client
                .invoke(&self.model, &snapshot, Some(self.tools.manifest()))
                .await;

            match reply {
                Err(e) => {
                    warn!(error = %e, "tooled completion failed; falling back to plain completion");
                    return self.plain_completion().await;
                }
                Ok(ModelReply::ToolCalls { content, calls }) => {
                    // The requesting assistant turn must precede the
                    // corresponding tool-result turns.
                    let request = Message::assistant_with_tool_calls(content, calls.clone());
                    if let Err(e) = self.history.append(request) {
                        return self.record_failure(e.to_string());
                    }

                    let ctx = ToolExecutionContext {
                        session_id: self.session_id.clone(),
                    };
                    for call in &calls {
                        let result = self.tools.invoke(&call.name, &call.arguments, &ctx).await;
                        let answer = Message::tool_result(&call.id, &call.name, result);
                        if let Err(e) = self.history.append(answer) {
                            return self.record_failure(e.to_string());
                        }
                    }
                }
                Ok(ModelReply::Content(text)) => {
                    let message = Message::assistant(text);
                    return match self.history.append(message.clone()) {
                        Ok(()) => message,
                        Err(e) => self.record_failure(e.to_string()),
                    };
                }
            }
        }

        warn!(
            rounds = self.max_tool_rounds,
            "tool round budget exhausted; forcing plain finalization"
        );
        self.plain_completion().await
    }

    /// Degraded path: one tool-free model invocation over the current
    /// snapshot. A failure here is recorded in the history as a synthetic
    /// assistant message rather than raised.
    async fn plain_completion(&mut self) -> Message {
        let snapshot = self.history.snapshot_for_model();
        let message = match self.client.invoke(&self.model, &snapshot, None).await {
            Ok(ModelReply::Content(text)) => Message::assistant(text),
            Ok(ModelReply::ToolCalls { content, .. }) => {
                warn!("provider returned tool calls to a tool-free request");
                if content.is_empty() {
                    Message::assistant("<error: provider returned tool calls to a plain request>")
                } else {
                    Message::assistant(content)
                }
            }
            Err(e) => {
                warn!(error = %e, "plain completion failed");
                Message::assistant(format!("<error: {e}>"))
            }
        };

        match self.history.append(message.clone()) {
            Ok(()) => message,
            Err(e) => self.record_failure(e.to_string()),
        }
    }

    /// Record an internal failure as a synthetic assistant message so the
    /// conversation stays inspectable. Appending a plain assistant
    /// message can only be rejected while tool calls are open, in which
    /// case the marker is returned unrecorded.
    fn record_failure(&mut self, detail: String) -> Message {
        let message = Message::assistant(format!("<error: {detail}>"));
        if self.history.append(message.clone()).is_err() {
            error!(%detail, "failed to record error message in history");
        }
        message
    }
}
