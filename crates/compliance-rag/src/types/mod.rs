//! Core types for the engine

pub mod document;
pub mod response;
pub mod retrieval;

pub use document::{Chunk, Document, DocumentSummary, IngestOutcome, IngestRecord};
pub use response::{
    Answer, AnswerSource, IngestFailure, IngestReport, Statistics, NO_INFORMATION_RESPONSE,
};
pub use retrieval::{GatedResult, RetrievalResult};
