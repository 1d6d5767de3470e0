//! Document listing, invalidation and statistics

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{DocumentSummary, Statistics};

#[derive(Debug, Serialize)]
pub struct DocumentList {
    pub documents: Vec<DocumentSummary>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct InvalidateResponse {
    pub document_id: Uuid,
    /// Cached answers evicted
    pub invalidated: usize,
}

/// GET /api/documents - List all indexed documents
pub async fn list_documents(State(state): State<AppState>) -> Json<DocumentList> {
    let documents = state.engine().list_documents();
    Json(DocumentList {
        total: documents.len(),
        documents,
    })
}

/// POST /api/documents/:id/invalidate - Evict cached answers citing a document
pub async fn invalidate_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<InvalidateResponse>> {
    let invalidated = state.engine().invalidate(&id)?;
    Ok(Json(InvalidateResponse {
        document_id: id,
        invalidated,
    }))
}

/// GET /api/statistics - Index and cache statistics
pub async fn statistics(State(state): State<AppState>) -> Json<Statistics> {
    Json(state.engine().statistics())
}
