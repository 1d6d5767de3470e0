//! Data directory ingestion endpoint

use axum::{extract::State, Json};

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::IngestReport;

/// POST /api/ingest - Rescan the data directory
pub async fn ingest(State(state): State<AppState>) -> Result<Json<IngestReport>> {
    let report = state.pipeline().scan().await?;
    Ok(Json(report))
}
