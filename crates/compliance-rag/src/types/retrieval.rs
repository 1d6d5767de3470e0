//! Per-query retrieval results

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A raw nearest-neighbor hit joined with its chunk text
///
/// Produced per query and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk_id: Uuid,
    /// Distance reported by the index metric (lower is closer)
    pub distance: f32,
    pub text: String,
    pub source_document_id: Uuid,
    /// Display name of the source document
    pub source_name: String,
    /// Document revision the chunk was written under
    pub revision: u64,
}

/// A retrieval result that passed the similarity gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatedResult {
    #[serde(flatten)]
    pub result: RetrievalResult,
    /// `1 - distance`, always `>= threshold` of the gate that produced it
    pub similarity: f32,
}

impl GatedResult {
    pub fn chunk_id(&self) -> Uuid {
        self.result.chunk_id
    }

    pub fn text(&self) -> &str {
        &self.result.text
    }

    pub fn source_name(&self) -> &str {
        &self.result.source_name
    }

    pub fn source_document_id(&self) -> Uuid {
        self.result.source_document_id
    }
}
