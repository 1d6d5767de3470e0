//! Answer and retrieval endpoints

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::error::Result;
use crate::retrieval::ThresholdPreset;
use crate::server::state::AppState;
use crate::types::{Answer, GatedResult};

/// Body shared by the answer and retrieve endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    /// Natural-language compliance question
    pub query: String,
    /// Number of chunks to retrieve (default from config)
    #[serde(default)]
    pub k: Option<usize>,
    /// Similarity threshold, overrides `preset`
    #[serde(default)]
    pub threshold: Option<f32>,
    /// Named threshold preset
    #[serde(default)]
    pub preset: Option<ThresholdPreset>,
    /// End-to-end deadline in milliseconds
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl QueryRequest {
    fn resolve(&self, state: &AppState) -> (usize, f32, Option<Duration>) {
        let defaults = state.engine().retrieval_defaults();
        let k = self.k.unwrap_or(defaults.k);
        let threshold = self
            .threshold
            .or_else(|| self.preset.map(|p| p.threshold()))
            .unwrap_or(defaults.similarity_threshold);
        (k, threshold, self.timeout_ms.map(Duration::from_millis))
    }
}

/// A cited chunk with its source document
#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    pub chunk_id: Uuid,
    pub document_id: Uuid,
    pub source_name: String,
    pub chunk_index: u32,
}

#[derive(Debug, Serialize)]
pub struct AnswerResponse {
    #[serde(flatten)]
    pub answer: Answer,
    /// Cited chunks, in citation order
    pub sources: Vec<SourceRef>,
    pub processing_time_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct RetrieveResponse {
    pub results: Vec<GatedResult>,
    pub count: usize,
    pub processing_time_ms: u64,
}

/// POST /api/answer - Answer a compliance question with citations
pub async fn answer(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<AnswerResponse>> {
    let start = Instant::now();
    let (k, threshold, timeout) = request.resolve(&state);

    let answer = state
        .engine()
        .answer_with_deadline(&request.query, k, threshold, timeout)
        .await?;

    let sources = answer
        .cited_chunk_ids
        .iter()
        .filter_map(|id| state.engine().chunk(id))
        .map(|chunk| SourceRef {
            chunk_id: chunk.id,
            document_id: chunk.source_document_id,
            source_name: chunk.source_name.clone(),
            chunk_index: chunk.chunk_index,
        })
        .collect();

    Ok(Json(AnswerResponse {
        answer,
        sources,
        processing_time_ms: start.elapsed().as_millis() as u64,
    }))
}

/// POST /api/retrieve - Gated chunks without generation
pub async fn retrieve(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<RetrieveResponse>> {
    let start = Instant::now();
    let (k, threshold, timeout) = request.resolve(&state);

    let results = state
        .engine()
        .retrieve_with_deadline(&request.query, k, threshold, timeout)
        .await?;

    Ok(Json(RetrieveResponse {
        count: results.len(),
        results,
        processing_time_ms: start.elapsed().as_millis() as u64,
    }))
}
