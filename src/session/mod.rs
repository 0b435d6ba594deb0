//! Concurrent session registry.
//!
//! Two lock tiers: a short-lived registry `RwLock` protecting the id →
//! session map, and one `tokio::sync::Mutex` per session serializing all
//! mutating operations against that session's history. The registry lock
//! is never held across an await; unrelated sessions proceed fully in
//! parallel.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::client::ModelClient;
use crate::engine::ChatEngine;
use crate::error::{BuzzError, Result};
use crate::history::History;
use crate::store::SessionStore;
use crate::tools::ToolRegistry;
use crate::types::{Message, Role};

const TITLE_MAX_CHARS: usize = 80;

/// One independent, stateful conversation.
///
/// The engine mutex is the session's exclusive lock: every mutating
/// operation acquires it, and the RAII guard releases it on all exit
/// paths. Holding it across model and tool I/O is deliberate — it is
/// what keeps the assistant-then-tool ordering intact under concurrency.
pub struct Session {
    id: String,
    engine: Mutex<ChatEngine>,
    created_at: DateTime<Utc>,
    updated_at: RwLock<DateTime<Utc>>,
}

impl Session {
    fn new(id: String, engine: ChatEngine) -> Self {
        let now = Utc::now();
        Self {
            id,
            engine: Mutex::new(engine),
            created_at: now,
            updated_at: RwLock::new(now),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        *self.updated_at.read().expect("updated_at lock poisoned")
    }

    fn touch(&self) {
        *self.updated_at.write().expect("updated_at lock poisoned") = Utc::now();
    }

    /// Run one conversation turn. Serialized per session.
    pub async fn complete(&self, prompt: impl Into<String>) -> Message {
        let mut engine = self.engine.lock().await;
        let reply = engine.complete(prompt).await;
        self.touch();
        reply
    }

    /// Switch the model for subsequent turns.
    pub async fn switch_model(&self, model: impl Into<String>) {
        let mut engine = self.engine.lock().await;
        engine.switch_model(model);
        self.touch();
    }

    /// Clear the history, optionally preserving the system prompt.
    pub async fn reset(&self, preserve_system_prompt: bool) {
        let mut engine = self.engine.lock().await;
        engine.reset(preserve_system_prompt);
        self.touch();
    }

    /// Current model id.
    pub async fn model(&self) -> String {
        self.engine.lock().await.model().to_string()
    }

    /// Snapshot of the message history.
    pub async fn history(&self) -> Vec<Message> {
        self.engine.lock().await.history().messages().to_vec()
    }

    /// Export the history as line-delimited JSON.
    pub async fn export_jsonl(&self) -> String {
        self.engine.lock().await.history().export_jsonl()
    }

    /// Metadata summary for listings.
    pub async fn info(&self) -> SessionInfo {
        let engine = self.engine.lock().await;
        let history = engine.history();
        SessionInfo {
            id: self.id.clone(),
            title: title_of(history.messages()),
            model: engine.model().to_string(),
            system_prompt: history.system_prompt().map(str::to_string),
            message_count: history.len(),
            created_at: self.created_at,
            updated_at: self.updated_at(),
        }
    }
}

/// Summary of one session, as listed to callers.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: String,
    pub title: Option<String>,
    pub model: String,
    pub system_prompt: Option<String>,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One chat turn as driven by a transport layer.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// Target session; absent or unknown means "create new".
    pub session_id: Option<String>,
    pub prompt: String,
    /// Switch to this model before completing, if it differs.
    pub model: Option<String>,
    /// Clear the history (preserving the system prompt) before completing.
    pub reset: bool,
}

/// Result of one chat turn.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub session_id: String,
    pub reply: Message,
    pub model: String,
}

/// Creates, looks up, and destroys sessions keyed by opaque ids.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    client: Arc<dyn ModelClient>,
    tools: Arc<ToolRegistry>,
    default_model: String,
    default_system_prompt: Option<String>,
}

impl SessionRegistry {
    pub fn new(
        client: Arc<dyn ModelClient>,
        tools: Arc<ToolRegistry>,
        default_model: impl Into<String>,
        default_system_prompt: Option<String>,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            client,
            tools,
            default_model: default_model.into(),
            default_system_prompt,
        }
    }

    /// Allocate a fresh session and return its id.
    pub fn create(&self, model: Option<String>, system_prompt: Option<String>) -> String {
        let id = Uuid::new_v4().simple().to_string();
        let model = model.unwrap_or_else(|| self.default_model.clone());
        let system_prompt = system_prompt.or_else(|| self.default_system_prompt.clone());
        let engine = ChatEngine::new(
            self.client.clone(),
            self.tools.clone(),
            model,
            system_prompt,
        )
        .with_session_id(id.clone());

        let session = Arc::new(Session::new(id.clone(), engine));
        self.sessions
            .write()
            .expect("session map lock poisoned")
            .insert(id.clone(), session);
        debug!(session = %id, "session created");
        id
    }

    /// Create a session over an imported JSONL history.
    ///
    /// # Errors
    ///
    /// Fails if any line is malformed or would break a history invariant.
    pub fn import(&self, model: Option<String>, jsonl: &str) -> Result<String> {
        let history = History::import_jsonl(jsonl)?;
        let id = Uuid::new_v4().simple().to_string();
        let model = model.unwrap_or_else(|| self.default_model.clone());
        let engine =
            ChatEngine::with_history(self.client.clone(), self.tools.clone(), model, history)
                .with_session_id(id.clone());

        let session = Arc::new(Session::new(id.clone(), engine));
        self.sessions
            .write()
            .expect("session map lock poisoned")
            .insert(id.clone(), session);
        Ok(id)
    }

    /// Look up a session.
    ///
    /// # Errors
    ///
    /// [`BuzzError::SessionNotFound`] for unknown ids — lookups never
    /// create sessions implicitly.
    pub fn get(&self, session_id: &str) -> Result<Arc<Session>> {
        self.sessions
            .read()
            .expect("session map lock poisoned")
            .get(session_id)
            .cloned()
            .ok_or_else(|| BuzzError::SessionNotFound(session_id.to_string()))
    }

    /// Remove a session.
    ///
    /// An operation already in flight holds its own `Arc` and completes
    /// against a coherent, detached session object; it never observes a
    /// half-deleted state.
    pub fn delete(&self, session_id: &str) -> Result<()> {
        self.sessions
            .write()
            .expect("session map lock poisoned")
            .remove(session_id)
            .map(|_| debug!(session = session_id, "session deleted"))
            .ok_or_else(|| BuzzError::SessionNotFound(session_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .expect("session map lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Summaries of all sessions, most recently updated first.
    pub async fn list(&self) -> Vec<SessionInfo> {
        let sessions: Vec<Arc<Session>> = self
            .sessions
            .read()
            .expect("session map lock poisoned")
            .values()
            .cloned()
            .collect();

        let mut infos = Vec::with_capacity(sessions.len());
        for session in sessions {
            infos.push(session.info().await);
        }
        infos.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        infos
    }

    /// Run one chat turn, creating a session when the request names none
    /// (or an unknown one). Model switch and reset apply under the same
    /// session lock as the completion itself.
    pub async fn chat(&self, request: ChatRequest) -> ChatOutcome {
        let session = match request.session_id.as_deref().and_then(|id| self.get(id).ok()) {
            Some(session) => session,
            None => {
                let id = self.create(request.model.clone(), None);
                self.get(&id).expect("freshly created session exists")
            }
        };

        let mut engine = session.engine.lock().await;
        if let Some(ref model) = request.model {
            if model != engine.model() {
                engine.switch_model(model.clone());
            }
        }
        if request.reset {
            engine.reset(true);
        }
        let reply = engine.complete(request.prompt).await;
        let model = engine.model().to_string();
        drop(engine);
        session.touch();

        ChatOutcome {
            session_id: session.id().to_string(),
            reply,
            model,
        }
    }

    /// Switch a session's model; returns the model now in effect.
    pub async fn switch_model(&self, session_id: &str, model: impl Into<String>) -> Result<String> {
        let session = self.get(session_id)?;
        let model = model.into();
        session.switch_model(model.clone()).await;
        Ok(model)
    }

    /// Reset a session's history.
    pub async fn reset(&self, session_id: &str, preserve_system_prompt: bool) -> Result<()> {
        let session = self.get(session_id)?;
        session.reset(preserve_system_prompt).await;
        Ok(())
    }

    /// Export a session's history as line-delimited JSON.
    pub async fn export(&self, session_id: &str) -> Result<String> {
        let session = self.get(session_id)?;
        Ok(session.export_jsonl().await)
    }

    /// Persist a session's history through the given store.
    pub async fn save(&self, session_id: &str, store: &dyn SessionStore) -> Result<()> {
        let session = self.get(session_id)?;
        let engine = session.engine.lock().await;
        store.save_history(session_id, engine.history())
    }
}

fn title_of(messages: &[Message]) -> Option<String> {
    messages
        .iter()
        .find(|m| m.role == Role::User)
        .map(|m| {
            let mut title: String = m.content.chars().take(TITLE_MAX_CHARS).collect();
            if m.content.chars().count() > TITLE_MAX_CHARS {
                title.push('…');
            }
            title
        })
}
