use std::path::{Path, PathBuf};

use linfa::traits::Fit;
use linfa::DatasetBase;
use linfa_logistic::LogisticRegression;
use ndarray::{Array1, Array2};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::ScorerConfig;
use crate::error::{ModeraError, Result};

use super::Scorer;

/// The serialized shape of a fitted model: weights plus intercept, linear
/// in the 4 input features. Stored as JSON rather than through `linfa`'s
/// own (de)serialization so the on-disk artifact format is ours to own
/// and stays stable across `linfa` upgrades.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ModelArtifact {
    weights: [f64; 4],
    intercept: f64,
}

impl ModelArtifact {
    fn predict_proba(&self, features: [f64; 4]) -> f64 {
        let z = self
            .weights
            .iter()
            .zip(features.iter())
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.intercept;
        1.0 / (1.0 + (-z).exp())
    }
}

/// In-process logistic-regression scorer.
///
/// Loads a fitted model from `scorer.model_path` on construction. When the
/// artifact is missing entirely, it trains one on synthetic data and
/// persists it as a bootstrap model; when the artifact exists but is
/// unreadable or corrupt, construction fails with `ScorerNotLoaded`.
pub struct LogisticScorer {
    model_path: PathBuf,
    model: RwLock<ModelArtifact>,
}

impl std::fmt::Debug for LogisticScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogisticScorer")
            .field("model_path", &self.model_path)
            .finish_non_exhaustive()
    }
}

impl LogisticScorer {
    pub async fn load_or_train(config: &ScorerConfig) -> Result<Self> {
        let model_path = PathBuf::from(&config.model_path);
        let model = if model_path.exists() {
            load_artifact(&model_path)?
        } else {
            info!(path = %model_path.display(), "scorer artifact missing, training bootstrap model");
            let artifact = train_bootstrap_model();
            save_artifact(&model_path, &artifact)?;
            artifact
        };
        Ok(Self {
            model_path,
            model: RwLock::new(model),
        })
    }
}

#[async_trait::async_trait]
impl Scorer for LogisticScorer {
    async fn score(&self, features: [f64; 4]) -> Result<f64> {
        let model = self.model.read().await;
        let probability = model.predict_proba(features);
        if !probability.is_finite() {
            return Err(ModeraError::ScorerFailed(anyhow::anyhow!(
                "model produced a non-finite probability"
            )));
        }
        Ok(probability.clamp(0.0, 1.0))
    }
}

fn load_artifact(path: &Path) -> Result<ModelArtifact> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ModeraError::ScorerNotLoaded(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&raw)
        .map_err(|e| ModeraError::ScorerNotLoaded(format!("{}: {e}", path.display())))
}

fn save_artifact(path: &Path, artifact: &ModelArtifact) -> Result<()> {
    let raw = serde_json::to_string_pretty(artifact)
        .map_err(|e| ModeraError::ScorerFailed(anyhow::anyhow!(e)))?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }
    std::fs::write(path, raw).map_err(|e| {
        warn!(path = %path.display(), error = %e, "failed to persist trained scorer artifact");
        ModeraError::ScorerFailed(anyhow::anyhow!(e))
    })
}

/// Trains a logistic-regression model on synthetic data: 1000 random
/// 4-feature rows, with the label a deterministic function of two of the
/// features.
fn train_bootstrap_model() -> ModelArtifact {
    let mut rng = StdRng::seed_from_u64(42);
    let n_samples = 1000;
    let mut records = Array2::<f64>::zeros((n_samples, 4));
    let mut targets = Array1::<usize>::zeros(n_samples);

    for i in 0..n_samples {
        let row: [f64; 4] = std::array::from_fn(|_| rng.gen::<f64>());
        let is_violation = row[0] < 0.3 && row[1] < 0.2;
        for (j, v) in row.iter().enumerate() {
            records[[i, j]] = *v;
        }
        targets[i] = usize::from(is_violation);
    }

    let dataset = DatasetBase::new(records, targets);
    let model = LogisticRegression::default()
        .max_iterations(200)
        .fit(&dataset)
        .expect("bootstrap logistic regression fit over synthetic data never fails");

    let weights: Vec<f64> = model.params().to_vec();
    ModelArtifact {
        weights: weights.try_into().expect("model trained on 4 features"),
        intercept: model.intercept(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_model_scores_in_unit_interval() {
        let artifact = train_bootstrap_model();
        let p = artifact.predict_proba([0.1, 0.05, 0.2, 0.1]);
        assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn bootstrap_model_favors_unverified_low_images_as_violation() {
        let artifact = train_bootstrap_model();
        let violation_leaning = artifact.predict_proba([0.0, 0.0, 0.1, 0.1]);
        let clean_leaning = artifact.predict_proba([1.0, 1.0, 0.1, 0.1]);
        assert!(violation_leaning > clean_leaning);
    }
}
