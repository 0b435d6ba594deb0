//! Closed tool registry populated at startup.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use tracing::{debug, warn};

use super::arguments::ToolArguments;
use super::tool::{Tool, ToolExecutionContext};
use super::types::ToolDefinition;
use crate::error::{BuzzError, Result};

/// Maps tool names to executable capabilities and to the manifest
/// advertised to the model.
///
/// Registration happens at startup; [`manifest`](Self::manifest) is
/// computed once on first use and immutable thereafter. Invocation is
/// total: lookup failures, malformed arguments, and tool errors all
/// become textual results the model can see, never process-level errors.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
    manifest: OnceLock<Vec<ToolDefinition>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry preloaded with the built-in demo tools.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register(Arc::new(super::builtin::d6_tool()))
            .expect("built-in tool names are unique");
        registry
    }

    /// Register a tool.
    ///
    /// # Errors
    ///
    /// [`BuzzError::DuplicateTool`] if the name is already taken, or
    /// [`BuzzError::Configuration`] if the manifest has already been
    /// advertised (registration is a startup-time operation).
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        if self.manifest.get().is_some() {
            return Err(BuzzError::Configuration(
                "tool registry is frozen once its manifest has been advertised".into(),
            ));
        }
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(BuzzError::DuplicateTool(name));
        }
        self.order.push(name.clone());
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Registered tool names, in registration order.
    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Result<&Arc<dyn Tool>> {
        self.tools
            .get(name)
            .ok_or_else(|| BuzzError::UnknownTool(name.to_string()))
    }

    /// The JSON-Schema tool manifest advertised to the model.
    ///
    /// Computed once, in registration order, immutable thereafter.
    pub fn manifest(&self) -> &[ToolDefinition] {
        self.manifest.get_or_init(|| {
            self.order
                .iter()
                .filter_map(|name| self.tools.get(name))
                .map(|tool| ToolDefinition {
                    name: tool.name().to_string(),
                    description: tool.description().to_string(),
                    parameters: tool.parameters().schema.clone(),
                })
                .collect()
        })
    }

    /// Execute a tool call, returning a textual result.
    ///
    /// Unknown names yield `<error: unknown function NAME>`; malformed or
    /// missing argument JSON is treated as an empty-argument call; tool
    /// failures yield `<error executing NAME: ...>`. This function never
    /// fails — the conversation must be able to continue with the model
    /// seeing the error.
    pub async fn invoke(
        &self,
        name: &str,
        arguments_json: &str,
        ctx: &ToolExecutionContext,
    ) -> String {
        let tool = match self.get(name) {
            Ok(tool) => tool,
            Err(_) => {
                warn!(tool = name, "unknown tool requested");
                return format!("<error: unknown function {name}>");
            }
        };

        let args = parse_arguments(arguments_json);
        debug!(tool = name, "executing tool");
        match tool.execute(&args, ctx).await {
            Ok(result) => result,
            Err(e) => {
                warn!(tool = name, error = %e, "tool execution failed");
                format!("<error executing {name}: {e}>")
            }
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.order)
            .finish()
    }
}

/// Parse raw argument JSON defensively: anything that is not a JSON
/// object becomes an empty-argument call.
fn parse_arguments(raw: &str) -> ToolArguments {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return ToolArguments::empty();
    }
    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(value) if value.is_object() => ToolArguments::new(value),
        Ok(_) | Err(_) => {
            warn!("malformed tool arguments; treating as empty call");
            ToolArguments::empty()
        }
    }
}
