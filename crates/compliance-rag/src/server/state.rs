//! Application state for the HTTP server

use std::sync::Arc;

use crate::engine::RagEngine;
use crate::ingestion::IngestPipeline;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    engine: Arc<RagEngine>,
    pipeline: Arc<IngestPipeline>,
}

impl AppState {
    pub fn new(engine: Arc<RagEngine>, pipeline: Arc<IngestPipeline>) -> Self {
        Self {
            inner: Arc::new(AppStateInner { engine, pipeline }),
        }
    }

    pub fn engine(&self) -> &Arc<RagEngine> {
        &self.inner.engine
    }

    pub fn pipeline(&self) -> &Arc<IngestPipeline> {
        &self.inner.pipeline
    }
}
