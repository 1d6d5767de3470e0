//! Similarity gate between retrieval and generation
//!
//! Chunks whose similarity falls below the threshold never reach the
//! generation backend. The bound is inclusive: a chunk whose similarity is
//! exactly the threshold passes.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::retrieval::index::DistanceMetric;
use crate::types::{GatedResult, RetrievalResult};

/// Named thresholds for common use cases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdPreset {
    /// Only highly relevant results
    Strict,
    /// Balanced relevance filtering
    Moderate,
    /// Minimal filtering
    Lenient,
    /// Tuned for pharmaceutical regulatory documents
    Pharmaceutical,
}

impl ThresholdPreset {
    pub fn threshold(&self) -> f32 {
        match self {
            ThresholdPreset::Strict => 0.5,
            ThresholdPreset::Moderate => 0.3,
            ThresholdPreset::Lenient => 0.2,
            ThresholdPreset::Pharmaceutical => 0.35,
        }
    }
}

impl FromStr for ThresholdPreset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "moderate" => Ok(Self::Moderate),
            "lenient" => Ok(Self::Lenient),
            "pharmaceutical" => Ok(Self::Pharmaceutical),
            other => Err(Error::invalid_request(format!("Unknown threshold preset: {}", other))),
        }
    }
}

/// Check a caller-supplied threshold
pub fn validate_threshold(threshold: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(Error::invalid_request(format!(
            "similarity threshold must be within [0, 1], got {}",
            threshold
        )));
    }
    Ok(())
}

/// Keep results with `1 - distance >= threshold`, preserving input order
pub fn filter(results: Vec<RetrievalResult>, threshold: f32) -> Vec<GatedResult> {
    results
        .into_iter()
        .filter_map(|result| {
            let similarity = 1.0 - result.distance;
            (similarity >= threshold).then_some(GatedResult { result, similarity })
        })
        .collect()
}

/// Gate bound to the index metric
///
/// Only bounded metrics have a defined `1 - distance` similarity, so the gate
/// refuses to be built for anything else.
#[derive(Debug, Clone, Copy)]
pub struct SimilarityGate {
    metric: DistanceMetric,
}

impl SimilarityGate {
    pub fn new(metric: DistanceMetric) -> Result<Self> {
        if !metric.is_bounded() {
            return Err(Error::Config(format!(
                "similarity gate requires a bounded distance metric, index uses {:?}",
                metric
            )));
        }
        Ok(Self { metric })
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn apply(&self, results: Vec<RetrievalResult>, threshold: f32) -> Vec<GatedResult> {
        let before = results.len();
        let gated = filter(results, threshold);
        if gated.len() < before {
            tracing::debug!(
                "Similarity gate dropped {} of {} chunks (threshold {})",
                before - gated.len(),
                before,
                threshold
            );
        }
        gated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn result(distance: f32) -> RetrievalResult {
        RetrievalResult {
            chunk_id: Uuid::new_v4(),
            distance,
            text: format!("chunk at {}", distance),
            source_document_id: Uuid::new_v4(),
            source_name: "gazette.pdf".to_string(),
            revision: 1,
        }
    }

    fn next_up(x: f32) -> f32 {
        f32::from_bits(x.to_bits() + 1)
    }

    #[test]
    fn test_filter_preserves_order_and_bound() {
        let input = vec![result(0.1), result(0.9), result(0.3), result(0.7), result(0.5)];
        let ids: Vec<Uuid> = input.iter().map(|r| r.chunk_id).collect();

        for threshold in [0.0, 0.2, 0.35, 0.5, 0.75, 1.0] {
            let gated = filter(input.clone(), threshold);
            assert!(gated.iter().all(|g| g.similarity >= threshold));

            // order is a subsequence of the input
            let positions: Vec<usize> = gated
                .iter()
                .map(|g| ids.iter().position(|id| *id == g.chunk_id()).unwrap())
                .collect();
            assert!(positions.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_threshold_equal_to_similarity_is_included() {
        let r = result(0.25);
        let similarity = 1.0 - r.distance;

        let gated = filter(vec![r.clone()], similarity);
        assert_eq!(gated.len(), 1);
        assert_eq!(gated[0].similarity, similarity);

        // one unit above the similarity excludes it
        assert!(filter(vec![r], next_up(similarity)).is_empty());
    }

    #[test]
    fn test_threshold_edges() {
        let input = vec![result(0.0), result(0.5), result(1.0)];
        assert_eq!(filter(input.clone(), 0.0).len(), 3);

        let exact_only = filter(input, 1.0);
        assert_eq!(exact_only.len(), 1);
        assert_eq!(exact_only[0].result.distance, 0.0);

        assert!(filter(Vec::new(), 0.35).is_empty());
    }

    #[test]
    fn test_validate_threshold() {
        assert!(validate_threshold(0.0).is_ok());
        assert!(validate_threshold(1.0).is_ok());
        assert!(validate_threshold(-0.01).is_err());
        assert!(validate_threshold(1.01).is_err());
        assert!(validate_threshold(f32::NAN).is_err());
    }

    #[test]
    fn test_presets() {
        assert_eq!("pharmaceutical".parse::<ThresholdPreset>().unwrap().threshold(), 0.35);
        assert_eq!("STRICT".parse::<ThresholdPreset>().unwrap().threshold(), 0.5);
        assert!("loose".parse::<ThresholdPreset>().is_err());
    }

    #[test]
    fn test_gate_rejects_unbounded_metric() {
        assert!(SimilarityGate::new(DistanceMetric::Cosine).is_ok());
        assert!(SimilarityGate::new(DistanceMetric::Euclidean).is_err());
    }
}
