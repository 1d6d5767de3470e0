//! Document and chunk types with revision tracking

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Namespace for deriving document ids from their path
const DOCUMENT_NAMESPACE: Uuid = Uuid::NAMESPACE_URL;

/// A regulatory document known to the engine
///
/// Documents are never hard-deleted. Re-ingesting changed content bumps
/// `revision`; chunks written under an older revision stay in the store but
/// are excluded from search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Stable document ID (derived from the path)
    pub id: Uuid,
    /// Source path
    pub path: PathBuf,
    /// Current revision, starting at 1
    pub revision: u64,
    /// SHA-256 of the content that produced the current revision
    pub content_hash: String,
    /// Chunks belonging to the current revision
    pub chunk_ids: Vec<Uuid>,
    /// Every chunk of the current revision has been written
    #[serde(default)]
    pub complete: bool,
    /// When the current revision was first seen
    pub indexed_at: DateTime<Utc>,
}

impl Document {
    /// Derive the stable document ID for a path
    pub fn id_for_path(path: &Path) -> Uuid {
        Uuid::new_v5(&DOCUMENT_NAMESPACE, path.to_string_lossy().as_bytes())
    }

    /// Display name used in citations
    pub fn display_name(&self) -> String {
        display_name(&self.path)
    }
}

/// File name portion of a path, falling back to the full path
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

/// A chunk of text from a document, with its embedding
///
/// Owned by the chunk store. The embedding is shared and never rewritten.
#[derive(Debug, Clone, Serialize)]
pub struct Chunk {
    /// Unique chunk ID
    pub id: Uuid,
    /// Owning document
    pub source_document_id: Uuid,
    /// Display name of the owning document (for citations)
    pub source_name: String,
    /// Text content
    pub text: String,
    /// Embedding vector
    #[serde(skip_serializing)]
    pub embedding: Arc<[f32]>,
    /// Position within the document revision
    pub chunk_index: u32,
    /// Document revision this chunk was written under
    pub revision: u64,
    /// Write timestamp
    pub created_at: DateTime<Utc>,
}

/// One unit of the ingestion stream
///
/// Delivery is at-least-once; re-delivering the same record is a no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRecord {
    pub document_id: Uuid,
    pub path: PathBuf,
    pub revision: u64,
    pub content_hash: String,
    pub chunk_id: Uuid,
    pub chunk_index: u32,
    pub text: String,
    pub embedding: Vec<f32>,
}

impl IngestRecord {
    /// Deterministic chunk ID for a (document, revision, position) triple
    ///
    /// Re-running the pipeline over unchanged content yields the same IDs,
    /// which is what makes duplicate delivery idempotent.
    pub fn chunk_id_for(document_id: &Uuid, revision: u64, chunk_index: u32) -> Uuid {
        Uuid::new_v5(document_id, format!("{}:{}", revision, chunk_index).as_bytes())
    }
}

/// What happened to a record handed to the chunk store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestOutcome {
    /// New chunk written
    Inserted {
        /// The record advanced its document to a new revision
        revision_advanced: bool,
    },
    /// Same chunk already stored with identical content
    Unchanged,
    /// Record belongs to a revision older than the document's current one
    Stale,
}

impl IngestOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, IngestOutcome::Inserted { .. })
    }
}

/// Summary of a document for listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: Uuid,
    pub name: String,
    pub path: PathBuf,
    pub revision: u64,
    pub chunk_count: usize,
    pub complete: bool,
    pub indexed_at: DateTime<Utc>,
}

impl From<&Document> for DocumentSummary {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id,
            name: doc.display_name(),
            path: doc.path.clone(),
            revision: doc.revision,
            chunk_count: doc.chunk_ids.len(),
            complete: doc.complete,
            indexed_at: doc.indexed_at,
        }
    }
}
