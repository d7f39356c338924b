//! LLM module - language model integrations
//!
//! Chat-service abstraction used by the engines and by locator healing.

pub mod ollama;
pub mod openai;
pub mod traits;

use std::sync::Arc;

use crate::core::{Config, ProviderType, Result};

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;
pub use traits::{GenerateOptions, LLMProvider, LLMResponse, TokenUsage};

/// Create the LLM provider selected by configuration
///
/// Missing credentials surface here as a configuration error.
pub fn create_provider(config: &Config) -> Result<Arc<dyn LLMProvider>> {
    let provider: Arc<dyn LLMProvider> = match config.llm.provider {
        ProviderType::Ollama => Arc::new(OllamaClient::from_config(config)?),
        ProviderType::OpenAi => Arc::new(OpenAiClient::from_config(config)?),
    };
    Ok(provider)
}
