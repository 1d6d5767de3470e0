//! compliance-rag: retrieval-and-answer engine for regulatory compliance questions
//!
//! Indexes regulatory documents as embedded chunks, retrieves the nearest
//! chunks for a question, drops those below a similarity threshold, and asks
//! a language model for an answer grounded in what remains. Answers cite the
//! chunks they came from and are cached until a cited document changes.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod storage;
pub mod types;

pub use config::RagConfig;
pub use engine::RagEngine;
pub use error::{Error, Result, Stage};
pub use types::{Answer, AnswerSource, GatedResult, IngestRecord, RetrievalResult};
