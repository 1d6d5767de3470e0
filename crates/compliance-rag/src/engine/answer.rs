//! Query path: cache check, retrieval, gating, generation

use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::Instant as Deadline;
use uuid::Uuid;

use super::RagEngine;
use crate::cache::{normalize_query, CacheEntry, CacheKey};
use crate::error::{Error, Result, Stage};
use crate::generation::{extract_cited_chunks, PromptBuilder};
use crate::retrieval::gate::validate_threshold;
use crate::types::{Answer, AnswerSource, GatedResult, RetrievalResult};

/// Run one stage of a request against an optional deadline
async fn within<T, F>(deadline: Option<Deadline>, stage: Stage, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut)
            .await
            .map_err(|_| Error::DeadlineExceeded { stage })?,
        None => fut.await,
    }
}

fn cached_answer(entry: &CacheEntry) -> Answer {
    Answer {
        text: entry.answer_text.clone(),
        cited_chunk_ids: entry.cited_chunk_ids.clone(),
        source: AnswerSource::Cache,
    }
}

fn check_request(query: &str, k: usize, threshold: f32) -> Result<String> {
    let normalized = normalize_query(query);
    if normalized.is_empty() {
        return Err(Error::invalid_request("query must not be empty"));
    }
    if k == 0 {
        return Err(Error::invalid_request("k must be at least 1"));
    }
    validate_threshold(threshold)?;
    Ok(normalized)
}

impl RagEngine {
    /// Answer a compliance query from the indexed documents
    pub async fn answer(&self, query: &str, k: usize, threshold: f32) -> Result<Answer> {
        self.answer_with_deadline(query, k, threshold, None).await
    }

    /// Answer a query, giving up once `timeout` has elapsed
    ///
    /// Nothing is cached when the deadline cuts a request short.
    pub async fn answer_with_deadline(
        &self,
        query: &str,
        k: usize,
        threshold: f32,
        timeout: Option<Duration>,
    ) -> Result<Answer> {
        let start = Instant::now();
        let deadline = timeout.map(|t| Deadline::now() + t);
        let normalized = check_request(query, k, threshold)?;

        tracing::info!("Query: \"{}\" (k={}, threshold={})", normalized, k, threshold);

        let key = CacheKey::new(&normalized, k, threshold, self.store.index_revision());
        let current = |doc_id: &Uuid| self.store.current_revision(doc_id);
        if let Some(entry) = self.cache.get_current(&key, current) {
            tracing::info!("Answer served from cache in {}ms", start.elapsed().as_millis());
            return Ok(cached_answer(&entry));
        }

        // One generation per key; later callers pick up the cached answer
        let _slot = within(deadline, Stage::Generate, async {
            Ok::<_, Error>(self.slots.acquire(&key).await)
        })
        .await?;
        if let Some(entry) = self.cache.peek_current(&key, current) {
            tracing::info!(
                "Answer generated by a concurrent request, served in {}ms",
                start.elapsed().as_millis()
            );
            return Ok(cached_answer(&entry));
        }

        let results = within(deadline, Stage::Retrieve, self.search(&normalized, k)).await?;
        let mut gated = self.gate.apply(results, threshold);

        if gated.is_empty() {
            tracing::info!("No chunk passed the similarity gate; skipping generation");
            return Ok(Answer::no_context());
        }

        PromptBuilder::order_by_similarity(&mut gated);
        let prompt = (self.template)(&gated, &normalized);
        let source_chunk_ids: Vec<Uuid> = gated.iter().map(GatedResult::chunk_id).collect();

        let text = within(
            deadline,
            Stage::Generate,
            self.retry.run(|| self.llm.generate(&prompt)),
        )
        .await?;

        let cited_chunk_ids = extract_cited_chunks(&text, &source_chunk_ids);
        let document_revisions: HashMap<Uuid, u64> = gated
            .iter()
            .map(|g| (g.result.source_document_id, g.result.revision))
            .collect();

        let entry = self.cache.entry(
            key.clone(),
            text.clone(),
            source_chunk_ids,
            cited_chunk_ids.clone(),
            document_revisions,
        );
        self.cache.put(key, entry);

        tracing::info!(
            "Query completed in {}ms, {} chunks in prompt, {} cited",
            start.elapsed().as_millis(),
            gated.len(),
            cited_chunk_ids.len()
        );

        Ok(Answer {
            text,
            cited_chunk_ids,
            source: AnswerSource::Generated,
        })
    }

    /// Retrieve and gate chunks without generating an answer
    ///
    /// Results keep retrieval order (ascending distance).
    pub async fn retrieve(
        &self,
        query: &str,
        k: usize,
        threshold: f32,
    ) -> Result<Vec<GatedResult>> {
        self.retrieve_with_deadline(query, k, threshold, None).await
    }

    pub async fn retrieve_with_deadline(
        &self,
        query: &str,
        k: usize,
        threshold: f32,
        timeout: Option<Duration>,
    ) -> Result<Vec<GatedResult>> {
        let deadline = timeout.map(|t| Deadline::now() + t);
        let normalized = check_request(query, k, threshold)?;
        let results = within(deadline, Stage::Retrieve, self.search(&normalized, k)).await?;
        Ok(self.gate.apply(results, threshold))
    }

    /// Embed the query and scan the index on the blocking pool
    async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievalResult>> {
        let embedding = self.embedder.embed(query).await?;
        let retriever = self.retriever.clone();

        tokio::task::spawn_blocking(move || retriever.search(&embedding, k))
            .await
            .map_err(|e| Error::internal(format!("Retrieval task failed: {}", e)))?
    }
}
