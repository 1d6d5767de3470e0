//! API routes for the compliance server

pub mod documents;
pub mod ingest;
pub mod query;

use axum::{
    routing::{get, post},
    Router,
};
use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Query
        .route("/answer", post(query::answer))
        .route("/retrieve", post(query::retrieve))
        // Documents
        .route("/documents", get(documents::list_documents))
        .route("/documents/:id/invalidate", post(documents::invalidate_document))
        .route("/statistics", get(documents::statistics))
        // Ingestion
        .route("/ingest", post(ingest::ingest))
        // Info
        .route("/info", get(info))
}

/// API info endpoint
async fn info() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": "compliance-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Grounded answers to regulatory compliance questions with chunk citations",
        "endpoints": {
            "POST /api/answer": "Answer a question from the indexed documents",
            "POST /api/retrieve": "Retrieve gated chunks without generation",
            "GET /api/documents": "List indexed documents",
            "POST /api/documents/:id/invalidate": "Evict cached answers citing a document",
            "GET /api/statistics": "Index and cache statistics",
            "POST /api/ingest": "Rescan the data directory"
        }
    }))
}
