//! Vector index, similarity gate and chunk retrieval

pub mod gate;
pub mod index;
pub mod search;

pub use gate::{SimilarityGate, ThresholdPreset};
pub use index::{DistanceMetric, IndexHit, VectorIndex};
pub use search::Retriever;
