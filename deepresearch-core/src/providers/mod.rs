//! LLM provider implementations.

pub mod openai;

pub use openai::OpenAiCompatibleProvider;

use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::llm::{LlmProvider, MockLlmProvider};
use std::sync::Arc;

/// Create an LLM provider based on the configuration.
///
/// Routes to the appropriate implementation:
/// - `"mock"` → [`MockLlmProvider`] (testing and dry runs)
/// - Everything else → [`OpenAiCompatibleProvider`] (OpenAI, Azure, Ollama,
///   vLLM, or any chat-completions-compatible endpoint)
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    match config.provider.as_str() {
        "mock" => Ok(Arc::new(MockLlmProvider::new())),
        _ => Ok(Arc::new(OpenAiCompatibleProvider::new(config)?)),
    }
}
