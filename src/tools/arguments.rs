//! Parsed tool arguments with typed accessors.

use serde::de::DeserializeOwned;

use crate::error::{BuzzError, Result};

/// Arguments passed to a tool, parsed from the model's raw JSON.
#[derive(Debug, Clone, Default)]
pub struct ToolArguments {
    value: serde_json::Value,
}

impl ToolArguments {
    /// Wrap a parsed JSON value.
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    /// An empty-argument call.
    pub fn empty() -> Self {
        Self {
            value: serde_json::json!({}),
        }
    }

    /// The underlying JSON value.
    pub fn as_value(&self) -> &serde_json::Value {
        &self.value
    }

    /// Get a required string argument.
    pub fn get_str(&self, key: &str) -> Result<&str> {
        self.get_str_opt(key)
            .ok_or_else(|| missing(key, "string"))
    }

    /// Get an optional string argument.
    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(|v| v.as_str())
    }

    /// Get a required integer argument.
    pub fn get_i64(&self, key: &str) -> Result<i64> {
        self.value
            .get(key)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| missing(key, "integer"))
    }

    /// Get a required boolean argument.
    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.value
            .get(key)
            .and_then(|v| v.as_bool())
            .ok_or_else(|| missing(key, "boolean"))
    }

    /// Deserialize the full argument object into a typed struct.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.value.clone())?)
    }
}

fn missing(key: &str, kind: &str) -> BuzzError {
    BuzzError::ToolExecution {
        tool_name: String::new(),
        message: format!("missing or invalid {kind} argument '{key}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_accessors() {
        let args = ToolArguments::new(serde_json::json!({"name": "Alice", "age": 30, "on": true}));
        assert_eq!(args.get_str("name").unwrap(), "Alice");
        assert_eq!(args.get_i64("age").unwrap(), 30);
        assert!(args.get_bool("on").unwrap());
        assert!(args.get_str("missing").is_err());
        assert_eq!(args.get_str_opt("missing"), None);
    }

    #[test]
    fn deserialize_into_struct() {
        #[derive(serde::Deserialize)]
        struct Params {
            query: String,
            limit: Option<u32>,
        }

        let args = ToolArguments::new(serde_json::json!({"query": "dice", "limit": 3}));
        let params: Params = args.deserialize().unwrap();
        assert_eq!(params.query, "dice");
        assert_eq!(params.limit, Some(3));
    }
}
