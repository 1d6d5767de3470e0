//! Response types for answers, statistics and ingestion runs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cache::CacheStats;

/// Fixed answer returned when no chunk passes the similarity gate
pub const NO_INFORMATION_RESPONSE: &str =
    "No relevant regulatory information found in the indexed documents.";

/// Where an answer came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    /// Freshly produced by the generation backend
    Generated,
    /// Served from the answer cache
    Cache,
    /// Nothing passed the similarity gate; fixed response
    NoContext,
}

/// A grounded answer with the chunks it cites
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// Answer text
    pub text: String,
    /// Chunks cited by the answer, in citation order
    pub cited_chunk_ids: Vec<Uuid>,
    /// How the answer was produced
    pub source: AnswerSource,
}

impl Answer {
    /// The defined outcome for an empty gated set
    pub fn no_context() -> Self {
        Self {
            text: NO_INFORMATION_RESPONSE.to_string(),
            cited_chunk_ids: Vec::new(),
            source: AnswerSource::NoContext,
        }
    }

    pub fn is_empty_context(&self) -> bool {
        self.source == AnswerSource::NoContext
    }
}

/// Index and cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct Statistics {
    /// Number of known documents
    pub document_count: usize,
    /// Chunks physically stored, including stale revisions
    pub stored_chunks: usize,
    /// Chunks at their document's current revision
    pub current_chunks: usize,
    /// Vectors in the index
    pub indexed_vectors: usize,
    /// Counter of effective index mutations
    pub index_revision: u64,
    /// Most recent document revision timestamp
    pub last_indexed: Option<DateTime<Utc>>,
    /// Answer cache statistics
    pub cache: CacheStats,
}

/// Result of one ingestion run over the data directory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestReport {
    /// Files examined
    pub files_seen: usize,
    /// Files whose content was unchanged since the last run
    pub files_unchanged: usize,
    /// Documents written under a new revision
    pub documents_updated: usize,
    /// Chunks inserted
    pub chunks_inserted: usize,
    /// Files that could not be ingested, with the reason
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<IngestFailure>,
}

/// A file that failed to ingest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestFailure {
    pub path: String,
    pub message: String,
}
