//! Application configuration loaded from the environment.

use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Configuration for the conversation engine and its model client.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// API key for the upstream model provider.
    pub api_key: String,
    /// Base URL of the provider API.
    pub base_url: String,
    /// Default model id for new sessions.
    pub model: String,
    /// Default system prompt for new sessions.
    pub system_prompt: Option<String>,
    /// Upper bound on one model round-trip.
    pub request_timeout: Duration,
}

impl AppConfig {
    /// Create a config with explicit credentials and defaults elsewhere.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            system_prompt: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Load from environment variables, honoring a `.env` file if present.
    ///
    /// Reads `OPENAI_API_KEY` (required), `OPENAI_BASE_URL`,
    /// `OPENAI_MODEL`, and `OPENAI_SYSTEM_PROMPT`.
    ///
    /// # Errors
    ///
    /// [`crate::error::BuzzError::Configuration`] if the API key is missing.
    pub fn from_env() -> crate::error::Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error

        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            crate::error::BuzzError::Configuration(
                "Missing OPENAI_API_KEY environment variable".into(),
            )
        })?;
        let base_url = std::env::var("OPENAI_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let system_prompt = std::env::var("OPENAI_SYSTEM_PROMPT").ok();

        Ok(Self {
            api_key,
            base_url,
            model,
            system_prompt,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the default model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the default system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Set the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
