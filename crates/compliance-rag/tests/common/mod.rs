//! In-process providers for engine tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use compliance_rag::providers::{EmbeddingProvider, LlmProvider};
use compliance_rag::{Error, IngestRecord, RagConfig, RagEngine, Result};

/// Embeds known queries to fixed vectors, anything else to `[0, 1]`
pub struct FixedEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    delay: Option<Duration>,
}

impl FixedEmbedder {
    pub fn new(vectors: &[(&str, Vec<f32>)]) -> Self {
        Self {
            vectors: vectors
                .iter()
                .map(|(q, v)| (q.to_string(), v.clone()))
                .collect(),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl EmbeddingProvider for FixedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.vectors.get(text).cloned().unwrap_or_else(|| vec![0.0, 1.0]))
    }

    fn dimensions(&self) -> usize {
        2
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// Replays scripted responses, then answers with `fallback`
pub struct ScriptedLlm {
    script: Mutex<VecDeque<Result<String>>>,
    fallback: String,
    delay: Option<Duration>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn answering(fallback: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: fallback.into(),
            delay: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn then_fail(self, error: Error) -> Self {
        self.script.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(self.fallback.clone()))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-1"
    }
}

/// Config for two-dimensional test embeddings with fast retries
pub fn test_config() -> RagConfig {
    let mut config = RagConfig::default();
    config.embeddings.dimensions = 2;
    config.retrieval.k = 2;
    config.generation.retry_backoff_base_ms = 5;
    config
}

pub fn engine(config: &RagConfig, embedder: FixedEmbedder, llm: Arc<ScriptedLlm>) -> RagEngine {
    RagEngine::new(config, Arc::new(embedder), llm).unwrap()
}

pub fn record(
    path: &str,
    revision: u64,
    chunk_index: u32,
    text: &str,
    embedding: Vec<f32>,
) -> IngestRecord {
    let path = PathBuf::from(path);
    let document_id = compliance_rag::types::Document::id_for_path(&path);
    IngestRecord {
        document_id,
        path,
        revision,
        content_hash: format!("hash-{}", revision),
        chunk_id: IngestRecord::chunk_id_for(&document_id, revision, chunk_index),
        chunk_index,
        text: text.to_string(),
        embedding,
    }
}

/// Unit vector at the given cosine similarity to `[1, 0]`
pub fn at_similarity(similarity: f32) -> Vec<f32> {
    vec![similarity, (1.0 - similarity * similarity).sqrt()]
}

pub fn tag(chunk_id: &Uuid) -> String {
    format!("[chunk:{}]", chunk_id)
}
