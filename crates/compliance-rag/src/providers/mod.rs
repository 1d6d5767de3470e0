//! Provider abstractions for embeddings and answer generation
//!
//! Trait-based so the engine can run against the local Ollama embedder and
//! any OpenAI-compatible generation endpoint, or against in-process fakes.

pub mod embedding;
pub mod llm;
pub mod ollama;
pub mod openrouter;

pub use embedding::EmbeddingProvider;
pub use llm::LlmProvider;
pub use ollama::OllamaEmbedder;
pub use openrouter::OpenRouterLlm;
