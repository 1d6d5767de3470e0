//! Joins vector index hits with chunk store content

use std::sync::Arc;

use crate::error::Result;
use crate::retrieval::index::VectorIndex;
use crate::storage::ChunkStore;
use crate::types::RetrievalResult;

/// Searches the index over current-revision chunks only
#[derive(Clone)]
pub struct Retriever {
    store: Arc<ChunkStore>,
    index: Arc<VectorIndex>,
}

impl Retriever {
    pub fn new(store: Arc<ChunkStore>, index: Arc<VectorIndex>) -> Self {
        Self { store, index }
    }

    /// Raw top-k over current chunks, ascending by distance
    ///
    /// Blocking; callers on the async runtime should run this through
    /// `spawn_blocking`.
    pub fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<RetrievalResult>> {
        let view = self.store.view();
        let hits = self
            .index
            .query_filtered(query_embedding, top_k, |id| view.is_current(id))?;

        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                let chunk = view.get(&hit.chunk_id)?;
                Some(RetrievalResult {
                    chunk_id: chunk.id,
                    distance: hit.distance,
                    text: chunk.text.clone(),
                    source_document_id: chunk.source_document_id,
                    source_name: chunk.source_name.clone(),
                    revision: chunk.revision,
                })
            })
            .collect())
    }

    pub fn store(&self) -> &Arc<ChunkStore> {
        &self.store
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }
}
