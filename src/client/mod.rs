//! Model client adapter boundary.
//!
//! The engine talks to the upstream model only through [`ModelClient`]:
//! one history snapshot plus an optional tool manifest in, one
//! [`ModelReply`] out. Transport, auth, and retry concerns live behind
//! this trait.

pub mod http;
pub mod openai;

pub use openai::OpenAiClient;

use async_trait::async_trait;

use crate::error::Result;
use crate::tools::ToolDefinition;
use crate::types::{Message, ToolCallRequest};

/// What the model answered: a plain assistant message, or a set of
/// requested tool invocations (with optional accompanying text).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelReply {
    Content(String),
    ToolCalls {
        content: String,
        calls: Vec<ToolCallRequest>,
    },
}

/// Adapter for one upstream model provider.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send a history snapshot upstream and return the model's reply.
    ///
    /// When `tools` is `Some`, the provider is asked to select tools
    /// automatically; `None` requests a plain completion.
    ///
    /// # Errors
    ///
    /// Transport, auth, rate-limit, and malformed-response failures.
    /// Callers treat any error as an adapter failure and degrade.
    async fn invoke(
        &self,
        model: &str,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ModelReply>;
}
