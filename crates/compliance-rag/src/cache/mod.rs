//! Answer cache

pub mod answer_cache;

pub use answer_cache::{normalize_query, AnswerCache, CacheEntry, CacheKey, CacheStats};
