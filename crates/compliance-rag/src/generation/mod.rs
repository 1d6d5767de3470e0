//! Prompt assembly, generation retries and citation handling

pub mod citation;
pub mod prompt;
pub mod retry;

pub use citation::extract_cited_chunks;
pub use prompt::{PromptBuilder, PromptTemplate, DEFAULT_SYSTEM_PROMPT};
pub use retry::RetryPolicy;
