//! Chunk and document storage

mod chunk_store;

pub use chunk_store::{ChunkStore, StoreView};
