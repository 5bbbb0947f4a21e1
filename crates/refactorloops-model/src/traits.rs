use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::ChatRequest;

/// Errors that can occur while talking to a model backend
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model request failed: {0}")]
    Network(String),

    #[error("Model request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Model API returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Failed to decode model response: {0}")]
    Parse(String),

    #[error("Model returned an empty response")]
    EmptyResponse,

    #[error("Model configuration error: {0}")]
    ConfigError(String),
}

impl ModelError {
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            ModelError::Timeout(timeout)
        } else if err.is_decode() {
            ModelError::Parse(err.to_string())
        } else {
            ModelError::Network(err.to_string())
        }
    }
}

/// Connection settings for a model backend
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Model identifier sent with every request
    pub model: String,
    /// Server base URL (None = provider default)
    pub base_url: Option<String>,
    /// Bearer token, if the backend needs one
    pub api_key: Option<String>,
    /// Wall-clock limit for a single chat call
    pub timeout: Duration,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: "deepseek-coder:latest".to_string(),
            base_url: None,
            api_key: None,
            timeout: Duration::from_secs(120),
        }
    }
}

impl ModelConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Supported model backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Ollama,
    OpenAi,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Ollama => write!(f, "ollama"),
            ProviderKind::OpenAi => write!(f, "openai"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" | "local" => Ok(ProviderKind::Ollama),
            "openai" | "open-ai" | "cloud" => Ok(ProviderKind::OpenAi),
            _ => Err(format!("Unknown model provider: {}", s)),
        }
    }
}

/// The core abstraction for chat-style language models
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Human-readable backend name (e.g., "Ollama")
    fn name(&self) -> &str;

    /// The backend kind
    fn provider(&self) -> ProviderKind;

    /// Model identifier used for requests
    fn model(&self) -> &str;

    /// Send the messages and return the assistant's free-form text
    async fn chat(&self, request: &ChatRequest) -> Result<String, ModelError>;

    /// Check whether the backend is reachable
    async fn is_available(&self) -> bool;
}
