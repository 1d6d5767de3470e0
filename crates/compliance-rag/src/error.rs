//! Error types for the compliance RAG engine

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Stage of a request at which a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Looking up a previously computed answer
    CacheCheck,
    /// Embedding the query and searching the vector index
    Retrieve,
    /// Applying the similarity threshold
    Gate,
    /// Calling the generation backend
    Generate,
    /// Writing chunks into the store and index
    Ingest,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::CacheCheck => "cache_check",
            Stage::Retrieve => "retrieve",
            Stage::Gate => "gate",
            Stage::Generate => "generate",
            Stage::Ingest => "ingest",
        };
        f.write_str(name)
    }
}

/// Engine errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller supplied an invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Embedding dimensionality does not match the index
    #[error("Dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A chunk id was re-delivered with different content
    #[error("Chunk {0} already exists with different content")]
    ChunkConflict(Uuid),

    /// Embedding error
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Retryable generation failure (network, timeout, rate limit, malformed response)
    #[error("Generation failed (transient): {0}")]
    GenerationTransient(String),

    /// Generation failure that retrying cannot fix (e.g. rejected prompt)
    #[error("Generation rejected (permanent): {0}")]
    GenerationPermanent(String),

    /// Generation kept failing after all retries
    #[error("Generation unavailable after {attempts} attempts: {last_error}")]
    GenerationUnavailable { attempts: u32, last_error: String },

    /// Caller-imposed deadline elapsed
    #[error("Deadline exceeded during {stage}")]
    DeadlineExceeded { stage: Stage },

    /// Document not found
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML config parse error
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create a transient generation error
    pub fn transient(message: impl Into<String>) -> Self {
        Self::GenerationTransient(message.into())
    }

    /// Create a permanent generation error
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::GenerationPermanent(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether a generation failure may succeed on retry
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::GenerationTransient(_))
    }

    /// Stage a failure belongs to, when it is stage-specific
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::DeadlineExceeded { stage } => Some(*stage),
            Error::GenerationTransient(_)
            | Error::GenerationPermanent(_)
            | Error::GenerationUnavailable { .. } => Some(Stage::Generate),
            Error::Embedding(_) | Error::DimensionMismatch { .. } => Some(Stage::Retrieve),
            Error::ChunkConflict(_) => Some(Stage::Ingest),
            _ => None,
        }
    }

    /// Whether the request was retried before failing
    pub fn retried(&self) -> bool {
        matches!(self, Error::GenerationUnavailable { attempts, .. } if *attempts > 1)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            Error::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            Error::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            Error::DimensionMismatch { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "dimension_mismatch")
            }
            Error::ChunkConflict(_) => (StatusCode::CONFLICT, "chunk_conflict"),
            Error::Embedding(_) => (StatusCode::BAD_GATEWAY, "embedding_error"),
            Error::GenerationTransient(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "generation_transient")
            }
            Error::GenerationPermanent(_) => (StatusCode::BAD_GATEWAY, "generation_permanent"),
            Error::GenerationUnavailable { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "generation_unavailable")
            }
            Error::DeadlineExceeded { .. } => (StatusCode::GATEWAY_TIMEOUT, "deadline_exceeded"),
            Error::DocumentNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
            Error::Json(_) => (StatusCode::BAD_REQUEST, "json_error"),
            Error::Toml(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            Error::Http(_) => (StatusCode::BAD_GATEWAY, "http_error"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": self.to_string(),
                "stage": self.stage(),
                "retried": self.retried(),
            }
        }));

        (status, body).into_response()
    }
}
