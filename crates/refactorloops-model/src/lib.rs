mod message;
mod ollama;
mod openai;
mod traits;

pub use message::{ChatMessage, ChatRequest, Role};
pub use ollama::OllamaModel;
pub use openai::OpenAiModel;
pub use traits::{ChatModel, ModelConfig, ModelError, ProviderKind};

/// Create a model client by provider
pub fn create_model(
    provider: ProviderKind,
    config: ModelConfig,
) -> Result<Box<dyn ChatModel>, ModelError> {
    match provider {
        ProviderKind::Ollama => Ok(Box::new(OllamaModel::new(config)?)),
        ProviderKind::OpenAi => Ok(Box::new(OpenAiModel::new(config)?)),
    }
}
