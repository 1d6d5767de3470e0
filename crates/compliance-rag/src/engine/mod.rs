//! Retrieval-and-answer engine
//!
//! Owns the chunk store, vector index, similarity gate and answer cache, and
//! wires them to the embedding and generation providers.

mod answer;
mod flight;

use std::sync::Arc;
use uuid::Uuid;

use self::flight::GenerationSlots;
use crate::cache::{AnswerCache, CacheStats};
use crate::config::{RagConfig, RetrievalConfig};
use crate::error::{Error, Result};
use crate::generation::{PromptBuilder, PromptTemplate, RetryPolicy};
use crate::providers::{EmbeddingProvider, LlmProvider};
use crate::retrieval::{DistanceMetric, Retriever, SimilarityGate, VectorIndex};
use crate::storage::ChunkStore;
use crate::types::{Chunk, Document, DocumentSummary, IngestOutcome, IngestRecord, Statistics};

/// The compliance retrieval-and-answer engine
///
/// Cheap to share behind an `Arc`; every operation takes `&self`.
pub struct RagEngine {
    defaults: RetrievalConfig,
    store: Arc<ChunkStore>,
    index: Arc<VectorIndex>,
    retriever: Retriever,
    gate: SimilarityGate,
    cache: AnswerCache,
    slots: GenerationSlots,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LlmProvider>,
    template: PromptTemplate,
    retry: RetryPolicy,
}

impl RagEngine {
    /// Create an engine with the default compliance prompt template
    pub fn new(
        config: &RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
    ) -> Result<Self> {
        let template = PromptBuilder::default_template(config.generation.system_prompt.clone());
        Self::with_template(config, embedder, llm, template)
    }

    /// Create an engine with a caller-supplied prompt template
    pub fn with_template(
        config: &RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
        template: PromptTemplate,
    ) -> Result<Self> {
        config.validate()?;

        let dimensions = config.embeddings.dimensions;
        if embedder.dimensions() != dimensions {
            return Err(Error::Config(format!(
                "embedding provider {} produces {} dimensions, index is configured for {}",
                embedder.name(),
                embedder.dimensions(),
                dimensions
            )));
        }

        let metric = DistanceMetric::Cosine;
        let store = Arc::new(ChunkStore::new());
        let index = Arc::new(VectorIndex::new(dimensions, metric));
        let retriever = Retriever::new(Arc::clone(&store), Arc::clone(&index));

        tracing::info!(
            "Engine ready: {} ({} dims), generation via {} ({})",
            embedder.name(),
            dimensions,
            llm.name(),
            llm.model()
        );

        Ok(Self {
            defaults: config.retrieval.clone(),
            store,
            index,
            retriever,
            gate: SimilarityGate::new(metric)?,
            cache: AnswerCache::new(config.cache.max_entries, config.cache.ttl()),
            slots: GenerationSlots::new(),
            embedder,
            llm,
            template,
            retry: RetryPolicy::from_config(&config.generation),
        })
    }

    /// Write one record from the ingestion stream
    ///
    /// At-least-once delivery is fine: a re-delivered chunk is a no-op and a
    /// record for an older revision is ignored. Advancing a document's
    /// revision evicts every cached answer that referenced it.
    pub fn ingest(&self, record: &IngestRecord) -> Result<IngestOutcome> {
        let expected = self.index.dimensions();
        if record.embedding.len() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                actual: record.embedding.len(),
            });
        }

        if self
            .store
            .current_revision(&record.document_id)
            .is_some_and(|current| record.revision < current)
        {
            return Ok(IngestOutcome::Stale);
        }

        // Index before store; search skips vectors with no current chunk.
        let embedding: Arc<[f32]> = record.embedding.as_slice().into();
        self.index.insert(record.chunk_id, Arc::clone(&embedding))?;

        let outcome = self.store.ingest(record, embedding)?;
        if let IngestOutcome::Inserted { revision_advanced: true } = outcome {
            self.cache.invalidate_by_document(&record.document_id);
        }

        Ok(outcome)
    }

    /// Write a batch of records, stopping at the first error
    pub fn ingest_batch(&self, records: &[IngestRecord]) -> Result<Vec<IngestOutcome>> {
        records.iter().map(|record| self.ingest(record)).collect()
    }

    /// Record that every chunk of a document revision has been ingested
    pub fn complete_revision(&self, document_id: &Uuid, revision: u64) -> Result<bool> {
        self.store.complete_revision(document_id, revision)
    }

    /// Evict every cached answer that references a document
    pub fn invalidate(&self, document_id: &Uuid) -> Result<usize> {
        if self.store.document(document_id).is_none() {
            return Err(Error::DocumentNotFound(document_id.to_string()));
        }
        Ok(self.cache.invalidate_by_document(document_id))
    }

    /// Index and cache statistics
    pub fn statistics(&self) -> Statistics {
        let (document_count, stored_chunks, current_chunks, last_indexed) = self.store.counts();
        Statistics {
            document_count,
            stored_chunks,
            current_chunks,
            indexed_vectors: self.index.len(),
            index_revision: self.store.index_revision(),
            last_indexed,
            cache: self.cache.stats(),
        }
    }

    /// All known documents, ordered by path
    pub fn list_documents(&self) -> Vec<DocumentSummary> {
        self.store.list_documents()
    }

    pub fn document(&self, document_id: &Uuid) -> Option<Document> {
        self.store.document(document_id)
    }

    pub fn chunk(&self, chunk_id: &Uuid) -> Option<Arc<Chunk>> {
        self.store.get(chunk_id)
    }

    /// `k` and threshold used when a request does not override them
    pub fn retrieval_defaults(&self) -> &RetrievalConfig {
        &self.defaults
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub fn llm(&self) -> &Arc<dyn LlmProvider> {
        &self.llm
    }
}
