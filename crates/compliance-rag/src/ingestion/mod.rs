//! Document ingestion from a data directory

mod chunker;
mod pipeline;
mod reader;

pub use chunker::TextChunker;
pub use pipeline::{FileOutcome, IngestPipeline};
pub use reader::{extract_text, SourceFormat};
