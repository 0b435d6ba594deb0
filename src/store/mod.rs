//! Session persistence boundary.
//!
//! The engine works against [`SessionStore`]; durability is optional.
//! [`FileSessionStore`] writes one `<id>.jsonl` per session,
//! [`MemoryStore`] keeps exports in memory and is the no-op-durability
//! implementation used in tests.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::error::{BuzzError, Result};
use crate::history::History;

/// Stored-session metadata for listings.
#[derive(Debug, Clone)]
pub struct StoredSession {
    pub id: String,
    pub title: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Durable storage of session histories.
pub trait SessionStore: Send + Sync {
    /// Persist the full history of a session.
    fn save_history(&self, session_id: &str, history: &History) -> Result<()>;

    /// Append one message to a session's stored history, creating the
    /// session record if needed.
    fn append_message(&self, session_id: &str, message: &crate::types::Message) -> Result<()>;

    /// Load a session's history.
    fn load_history(&self, session_id: &str) -> Result<History>;

    /// List stored sessions.
    fn list_sessions(&self) -> Result<Vec<StoredSession>>;
}

/// File-backed store: one line-delimited JSON file per session.
pub struct FileSessionStore {
    base_dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.base_dir.join(format!("{session_id}.jsonl"))
    }
}

impl SessionStore for FileSessionStore {
    fn save_history(&self, session_id: &str, history: &History) -> Result<()> {
        fs::create_dir_all(&self.base_dir)?;
        fs::write(self.path_for(session_id), history.export_jsonl())?;
        Ok(())
    }

    fn append_message(&self, session_id: &str, message: &crate::types::Message) -> Result<()> {
        use std::io::Write;

        fs::create_dir_all(&self.base_dir)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(session_id))?;
        let line = serde_json::to_string(message)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    fn load_history(&self, session_id: &str) -> Result<History> {
        let path = self.path_for(session_id);
        if !path.exists() {
            return Err(BuzzError::SessionNotFound(session_id.to_string()));
        }
        let contents = fs::read_to_string(path)?;
        History::import_jsonl(&contents)
    }

    fn list_sessions(&self) -> Result<Vec<StoredSession>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }
        let mut sessions = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            sessions.push(StoredSession {
                id: id.to_string(),
                title: first_user_line(&path),
                created_at: fs_time(entry.metadata()?.created().ok()),
                updated_at: fs_time(entry.metadata()?.modified().ok()),
            });
        }
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }
}

fn fs_time(time: Option<std::time::SystemTime>) -> Option<DateTime<Utc>> {
    time.map(DateTime::<Utc>::from)
}

fn first_user_line(path: &Path) -> Option<String> {
    let contents = fs::read_to_string(path).ok()?;
    for line in contents.lines() {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(line) {
            if value.get("role").and_then(|r| r.as_str()) == Some("user") {
                return value
                    .get("content")
                    .and_then(|c| c.as_str())
                    .map(str::to_string);
            }
        }
    }
    None
}

/// In-memory store with no durability, for tests and ephemeral use.
#[derive(Default)]
pub struct MemoryStore {
    exports: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn save_history(&self, session_id: &str, history: &History) -> Result<()> {
        self.exports
            .write()
            .expect("store lock poisoned")
            .insert(session_id.to_string(), history.export_jsonl());
        Ok(())
    }

    fn append_message(&self, session_id: &str, message: &crate::types::Message) -> Result<()> {
        let line = serde_json::to_string(message)?;
        let mut exports = self.exports.write().expect("store lock poisoned");
        let entry = exports.entry(session_id.to_string()).or_default();
        entry.push_str(&line);
        entry.push('\n');
        Ok(())
    }

    fn load_history(&self, session_id: &str) -> Result<History> {
        let exports = self.exports.read().expect("store lock poisoned");
        let jsonl = exports
            .get(session_id)
            .ok_or_else(|| BuzzError::SessionNotFound(session_id.to_string()))?;
        History::import_jsonl(jsonl)
    }

    fn list_sessions(&self) -> Result<Vec<StoredSession>> {
        let exports = self.exports.read().expect("store lock poisoned");
        Ok(exports
            .keys()
            .map(|id| StoredSession {
                id: id.clone(),
                title: None,
                created_at: None,
                updated_at: None,
            })
            .collect())
    }
}
