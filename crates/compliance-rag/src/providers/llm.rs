//! Generation backend trait

use async_trait::async_trait;
use crate::error::Result;

/// Trait for LLM-based answer generation
///
/// The prompt is fully assembled by the caller. Implementations must report
/// failures as `Error::GenerationTransient` when a retry may succeed and
/// `Error::GenerationPermanent` otherwise.
///
/// Implementations:
/// - `OpenRouterLlm`: OpenAI-compatible chat completions (OpenRouter by default)
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion for a prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
