//! OpenAI-compatible backend
//!
//! Works with OpenAI and any server exposing `/chat/completions` (vLLM, LM Studio, ...).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{ChatMessage, ChatModel, ChatRequest, ModelConfig, ModelError, ProviderKind};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Cloud or self-hosted model speaking the OpenAI chat completions protocol
pub struct OpenAiModel {
    client: Client,
    config: ModelConfig,
}

impl OpenAiModel {
    pub fn new(config: ModelConfig) -> Result<Self, ModelError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ModelError::ConfigError(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.api_key.as_deref() {
            Some(key) if !key.is_empty() => builder.bearer_auth(key),
            _ => builder,
        }
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    r#type: &'static str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl ChatModel for OpenAiModel {
    fn name(&self) -> &str {
        "OpenAI"
    }

    fn provider(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn chat(&self, request: &ChatRequest) -> Result<String, ModelError> {
        debug!(
            backend = self.name(),
            model = %self.config.model,
            prompt_len = request.prompt_len(),
            temperature = request.temperature,
            "Sending chat request"
        );

        let body = CompletionRequest {
            model: &self.config.model,
            messages: &request.messages,
            temperature: request.temperature,
            response_format: request.json_output.then_some(ResponseFormat {
                r#type: "json_object",
            }),
        };

        let builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url()))
            .json(&body);

        let response = self
            .authorize(builder)
            .send()
            .await
            .map_err(|e| ModelError::from_reqwest(e, self.config.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ModelError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ModelError::from_reqwest(e, self.config.timeout))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(ModelError::EmptyResponse)
    }

    async fn is_available(&self) -> bool {
        let builder = self.client.get(format!("{}/models", self.base_url()));
        self.authorize(builder)
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}
