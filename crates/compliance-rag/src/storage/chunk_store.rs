//! Append-only chunk store with revision-based soft invalidation

use chrono::{DateTime, Utc};
use parking_lot::{RwLock, RwLockReadGuard};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::document::display_name;
use crate::types::{Chunk, Document, DocumentSummary, IngestOutcome, IngestRecord};

#[derive(Default)]
struct StoreState {
    chunks: HashMap<Uuid, Arc<Chunk>>,
    documents: HashMap<Uuid, Document>,
}

impl StoreState {
    fn is_current(&self, chunk: &Chunk) -> bool {
        self.documents
            .get(&chunk.source_document_id)
            .is_some_and(|doc| doc.revision == chunk.revision)
    }
}

/// Chunk store owning every chunk and document record
///
/// Chunks are never removed. When a document advances to a new revision its
/// older chunks stay in place and simply stop counting as current.
pub struct ChunkStore {
    state: RwLock<StoreState>,
    /// Advanced on every insert that changed the store
    index_revision: AtomicU64,
}

impl ChunkStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            index_revision: AtomicU64::new(0),
        }
    }

    /// Write one record from the ingestion stream
    ///
    /// Duplicate delivery of an already stored chunk is a no-op. Records for
    /// a revision older than the document's current one are ignored.
    pub fn ingest(&self, record: &IngestRecord, embedding: Arc<[f32]>) -> Result<IngestOutcome> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        let now = Utc::now();

        if let Some(existing) = state.chunks.get(&record.chunk_id) {
            let same = existing.source_document_id == record.document_id
                && existing.revision == record.revision
                && existing.text == record.text
                && *existing.embedding == *embedding;
            return if same {
                Ok(IngestOutcome::Unchanged)
            } else {
                Err(Error::ChunkConflict(record.chunk_id))
            };
        }

        let mut revision_advanced = false;
        match state.documents.get_mut(&record.document_id) {
            Some(doc) if record.revision < doc.revision => {
                tracing::debug!(
                    "Ignoring chunk {} of stale revision {} (document {} is at {})",
                    record.chunk_id,
                    record.revision,
                    record.document_id,
                    doc.revision
                );
                return Ok(IngestOutcome::Stale);
            }
            Some(doc) if record.revision > doc.revision => {
                tracing::info!(
                    "Document {} advanced from revision {} to {}",
                    doc.display_name(),
                    doc.revision,
                    record.revision
                );
                doc.revision = record.revision;
                doc.content_hash = record.content_hash.clone();
                doc.chunk_ids.clear();
                doc.complete = false;
                doc.indexed_at = now;
                revision_advanced = true;
            }
            Some(_) => {}
            None => {
                state.documents.insert(
                    record.document_id,
                    Document {
                        id: record.document_id,
                        path: record.path.clone(),
                        revision: record.revision,
                        content_hash: record.content_hash.clone(),
                        chunk_ids: Vec::new(),
                        complete: false,
                        indexed_at: now,
                    },
                );
            }
        }

        let chunk = Chunk {
            id: record.chunk_id,
            source_document_id: record.document_id,
            source_name: display_name(&record.path),
            text: record.text.clone(),
            embedding,
            chunk_index: record.chunk_index,
            revision: record.revision,
            created_at: now,
        };
        state.chunks.insert(chunk.id, Arc::new(chunk));
        if let Some(doc) = state.documents.get_mut(&record.document_id) {
            doc.chunk_ids.push(record.chunk_id);
        }
        self.index_revision.fetch_add(1, Ordering::AcqRel);

        Ok(IngestOutcome::Inserted { revision_advanced })
    }

    /// Mark a revision as fully written
    ///
    /// Returns `false` if the document has since moved to another revision.
    pub fn complete_revision(&self, document_id: &Uuid, revision: u64) -> Result<bool> {
        let mut state = self.state.write();
        let doc = state
            .documents
            .get_mut(document_id)
            .ok_or_else(|| Error::DocumentNotFound(document_id.to_string()))?;
        if doc.revision != revision {
            return Ok(false);
        }
        doc.complete = true;
        Ok(true)
    }

    /// Read-locked view used while scanning the index
    pub fn view(&self) -> StoreView<'_> {
        StoreView {
            state: self.state.read(),
        }
    }

    /// Get a chunk by ID (current or stale)
    pub fn get(&self, chunk_id: &Uuid) -> Option<Arc<Chunk>> {
        self.state.read().chunks.get(chunk_id).cloned()
    }

    /// Whether a chunk belongs to its document's current revision
    pub fn is_current(&self, chunk_id: &Uuid) -> bool {
        self.view().is_current(chunk_id)
    }

    /// Current revision of a document
    pub fn current_revision(&self, document_id: &Uuid) -> Option<u64> {
        self.state.read().documents.get(document_id).map(|d| d.revision)
    }

    /// Get a document record
    pub fn document(&self, document_id: &Uuid) -> Option<Document> {
        self.state.read().documents.get(document_id).cloned()
    }

    /// Summaries of all documents, ordered by path
    pub fn list_documents(&self) -> Vec<DocumentSummary> {
        let state = self.state.read();
        let mut docs: Vec<DocumentSummary> =
            state.documents.values().map(DocumentSummary::from).collect();
        docs.sort_by(|a, b| a.path.cmp(&b.path));
        docs
    }

    /// Counter of effective mutations, part of every answer cache key
    pub fn index_revision(&self) -> u64 {
        self.index_revision.load(Ordering::Acquire)
    }

    /// (documents, stored chunks, current chunks, last indexed)
    pub fn counts(&self) -> (usize, usize, usize, Option<DateTime<Utc>>) {
        let state = self.state.read();
        let current = state.chunks.values().filter(|c| state.is_current(c)).count();
        let last_indexed = state.documents.values().map(|d| d.indexed_at).max();
        (state.documents.len(), state.chunks.len(), current, last_indexed)
    }
}

impl Default for ChunkStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Consistent read view over the store
pub struct StoreView<'a> {
    state: RwLockReadGuard<'a, StoreState>,
}

impl StoreView<'_> {
    pub fn is_current(&self, chunk_id: &Uuid) -> bool {
        self.state
            .chunks
            .get(chunk_id)
            .is_some_and(|chunk| self.state.is_current(chunk))
    }

    pub fn get(&self, chunk_id: &Uuid) -> Option<&Arc<Chunk>> {
        self.state.chunks.get(chunk_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn record(doc: Uuid, revision: u64, index: u32, text: &str) -> IngestRecord {
        IngestRecord {
            document_id: doc,
            path: PathBuf::from("data/schedule_h1.txt"),
            revision,
            content_hash: format!("hash-{}", revision),
            chunk_id: IngestRecord::chunk_id_for(&doc, revision, index),
            chunk_index: index,
            text: text.to_string(),
            embedding: vec![1.0, 0.0],
        }
    }

    fn embed(r: &IngestRecord) -> Arc<[f32]> {
        r.embedding.clone().into()
    }

    #[test]
    fn test_duplicate_delivery_is_noop() {
        let store = ChunkStore::new();
        let doc = Uuid::new_v4();
        let r = record(doc, 1, 0, "Tramadol is Schedule H1");

        assert_eq!(
            store.ingest(&r, embed(&r)).unwrap(),
            IngestOutcome::Inserted { revision_advanced: false }
        );
        let revision = store.index_revision();

        assert_eq!(store.ingest(&r, embed(&r)).unwrap(), IngestOutcome::Unchanged);
        assert_eq!(store.index_revision(), revision);
        assert_eq!(store.document(&doc).unwrap().chunk_ids.len(), 1);
    }

    #[test]
    fn test_conflicting_redelivery_rejected() {
        let store = ChunkStore::new();
        let doc = Uuid::new_v4();
        let r = record(doc, 1, 0, "original");
        store.ingest(&r, embed(&r)).unwrap();

        let mut changed = r.clone();
        changed.text = "rewritten".to_string();
        let err = store.ingest(&changed, embed(&changed)).unwrap_err();
        assert!(matches!(err, Error::ChunkConflict(id) if id == r.chunk_id));
    }

    #[test]
    fn test_new_revision_soft_invalidates_old_chunks() {
        let store = ChunkStore::new();
        let doc = Uuid::new_v4();
        let old = record(doc, 1, 0, "old text");
        store.ingest(&old, embed(&old)).unwrap();
        assert!(store.is_current(&old.chunk_id));

        let new = record(doc, 2, 0, "new text");
        assert_eq!(
            store.ingest(&new, embed(&new)).unwrap(),
            IngestOutcome::Inserted { revision_advanced: true }
        );

        // old chunk is still stored but no longer current
        assert!(store.get(&old.chunk_id).is_some());
        assert!(!store.is_current(&old.chunk_id));
        assert!(store.is_current(&new.chunk_id));
        assert_eq!(store.current_revision(&doc), Some(2));
        assert_eq!(store.document(&doc).unwrap().chunk_ids, vec![new.chunk_id]);

        let (docs, stored, current, _) = store.counts();
        assert_eq!((docs, stored, current), (1, 2, 1));
    }

    #[test]
    fn test_stale_revision_ignored() {
        let store = ChunkStore::new();
        let doc = Uuid::new_v4();
        let new = record(doc, 2, 0, "new text");
        store.ingest(&new, embed(&new)).unwrap();

        let late = record(doc, 1, 3, "late delivery of old revision");
        assert_eq!(store.ingest(&late, embed(&late)).unwrap(), IngestOutcome::Stale);
        assert!(store.get(&late.chunk_id).is_none());
    }

    #[test]
    fn test_revision_completion() {
        let store = ChunkStore::new();
        let doc = Uuid::new_v4();
        let first = record(doc, 1, 0, "first");
        store.ingest(&first, embed(&first)).unwrap();
        assert!(!store.document(&doc).unwrap().complete);

        assert!(store.complete_revision(&doc, 1).unwrap());
        assert!(store.document(&doc).unwrap().complete);

        // a newer revision starts incomplete; completing the old one is refused
        let second = record(doc, 2, 0, "second");
        store.ingest(&second, embed(&second)).unwrap();
        assert!(!store.document(&doc).unwrap().complete);
        assert!(!store.complete_revision(&doc, 1).unwrap());

        let missing = store.complete_revision(&Uuid::new_v4(), 1);
        assert!(matches!(missing, Err(Error::DocumentNotFound(_))));
    }
}
