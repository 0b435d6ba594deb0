//! Core conversation types.

pub mod message;

pub use message::{Message, Role, ToolCallRequest};
