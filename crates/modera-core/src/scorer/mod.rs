mod logistic;

pub use logistic::LogisticScorer;

use crate::error::Result;

/// Threshold above which a listing is judged a violation, inclusive of 0.5.
pub const VIOLATION_THRESHOLD: f64 = 0.5;

#[must_use]
pub fn is_violation(probability: f64) -> bool {
    probability >= VIOLATION_THRESHOLD
}

/// A classifier treated as an external collaborator of the pipeline.
/// Implementations take a 4-feature vector and return a violation
/// probability in `[0, 1]`.
#[async_trait::async_trait]
pub trait Scorer: Send + Sync + 'static {
    async fn score(&self, features: [f64; 4]) -> Result<f64>;
}
