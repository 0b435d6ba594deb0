//! buzzcore — conversation orchestration engine.
//!
//! Serves many independent tool-calling chat sessions from one process:
//! a per-session message [`history`], a closed [`tools`] registry, the
//! [`engine`] state machine that drives repeated model invocations until
//! a plain-text answer is produced, and a concurrent [`session`] registry
//! that serializes access to each session while unrelated sessions
//! progress in parallel. The upstream model is reached only through the
//! [`client`] adapter boundary.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use buzzcore::prelude::*;
//!
//! # async fn example() -> buzzcore::error::Result<()> {
//! let config = AppConfig::from_env()?;
//! let client = Arc::new(OpenAiClient::new(&config));
//! let tools = Arc::new(ToolRegistry::with_builtins());
//! let registry = SessionRegistry::new(client, tools, config.model.clone(), config.system_prompt.clone());
//!
//! let outcome = registry
//!     .chat(ChatRequest {
//!         prompt: "Roll a die for me".into(),
//!         ..Default::default()
//!     })
//!     .await;
//! println!("{}", outcome.reply.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod prelude;
pub mod session;
pub mod store;
pub mod tools;
pub mod types;
pub mod util;
