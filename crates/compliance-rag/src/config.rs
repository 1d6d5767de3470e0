//! Configuration for the compliance RAG engine
//!
//! Loaded once at startup (TOML file or defaults) and passed explicitly to
//! every component constructor. Nothing reads it again after that.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::retrieval::gate::ThresholdPreset;

/// Main engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Retrieval defaults (top-k, gate threshold)
    pub retrieval: RetrievalConfig,
    /// Answer cache configuration
    pub cache: CacheConfig,
    /// Generation backend configuration
    pub generation: GenerationConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Ingestion configuration
    pub ingestion: IngestionConfig,
}

impl RagConfig {
    /// Load configuration from a TOML file
    ///
    /// Missing sections and fields fall back to their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: RagConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        let threshold = self.retrieval.similarity_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::Config(format!(
                "similarity_threshold must be within [0, 1], got {}",
                threshold
            )));
        }
        if self.retrieval.k == 0 {
            return Err(Error::Config("k must be at least 1".to_string()));
        }
        if self.embeddings.dimensions == 0 {
            return Err(Error::Config("embedding dimensions must be non-zero".to_string()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::Config(
                "chunk_overlap must be smaller than chunk_size".to_string(),
            ));
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8001,
            enable_cors: true,
        }
    }
}

/// Retrieval defaults applied when a request does not override them
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of chunks to retrieve
    pub k: usize,
    /// Minimum similarity (inclusive) for a chunk to reach generation
    pub similarity_threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: 5,
            similarity_threshold: ThresholdPreset::Pharmaceutical.threshold(),
        }
    }
}

/// Answer cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime of a cached answer in seconds
    pub ttl_secs: u64,
    /// Maximum number of cached answers
    pub max_entries: usize,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            max_entries: 1000,
        }
    }
}

/// Generation backend configuration (OpenAI-compatible chat completions)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// API base URL
    pub base_url: String,
    /// Model name
    pub model: String,
    /// API key; normally injected from the environment by the binary
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Temperature for generation
    pub temperature: f32,
    /// Maximum tokens in the generated answer
    pub max_tokens: u32,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Retries after the first failed attempt
    pub retry_count: u32,
    /// Backoff before the first retry, in milliseconds (doubles each retry)
    pub retry_backoff_base_ms: u64,
    /// Optional system prompt override for the default template
    pub system_prompt: Option<String>,
}

impl GenerationConfig {
    pub fn retry_backoff_base(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_base_ms)
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            model: "anthropic/claude-sonnet-4".to_string(),
            api_key: None,
            temperature: 0.1, // Factual answers
            max_tokens: 1000,
            timeout_secs: 60,
            retry_count: 2,
            retry_backoff_base_ms: 1000,
            system_prompt: None,
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Embedding model name
    pub model: String,
    /// Embedding dimensions (384 for MiniLM, 768 for nomic-embed-text)
    pub dimensions: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
            timeout_secs: 30,
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap between chunks in characters
    pub chunk_overlap: usize,
    /// Minimum chunk size (skip smaller chunks)
    pub min_chunk_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 2400,
            chunk_overlap: 200,
            min_chunk_size: 50,
        }
    }
}

/// Ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Directory scanned for regulatory documents
    pub data_dir: PathBuf,
    /// Scan the data directory once at startup
    pub scan_on_start: bool,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("compliance-rag")
            .join("data");

        Self {
            data_dir,
            scan_on_start: true,
        }
    }
}
