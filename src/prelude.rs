//! Common imports.

pub use crate::client::{ModelClient, ModelReply, OpenAiClient};
pub use crate::config::AppConfig;
pub use crate::engine::ChatEngine;
pub use crate::error::{BuzzError, Result};
pub use crate::history::History;
pub use crate::session::{ChatOutcome, ChatRequest, SessionInfo, SessionRegistry};
pub use crate::store::{FileSessionStore, MemoryStore, SessionStore};
pub use crate::tools::{FunctionTool, Tool, ToolDefinition, ToolParameters, ToolRegistry};
pub use crate::types::{Message, Role, ToolCallRequest};
