use std::sync::Arc;

use crate::bus::BusProducer;
use crate::cache::{PredictionCache, TaskCache};
use crate::scorer::Scorer;
use crate::store::TaskStore;

/// Handles threaded through the service layer and axum extractors.
///
/// A flat, concretely-typed struct: this pipeline has exactly one store,
/// one cache pair, one bus and one scorer, so there is no generic backend
/// parameter to carry.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TaskStore>,
    pub prediction_cache: Arc<dyn PredictionCache>,
    pub task_cache: Arc<dyn TaskCache>,
    pub bus: Arc<dyn BusProducer>,
    pub scorer: Arc<dyn Scorer>,
}

impl AppState {
    #[must_use]
    pub fn new(
        store: Arc<dyn TaskStore>,
        prediction_cache: Arc<dyn PredictionCache>,
        task_cache: Arc<dyn TaskCache>,
        bus: Arc<dyn BusProducer>,
        scorer: Arc<dyn Scorer>,
    ) -> Self {
        Self {
            store,
            prediction_cache,
            task_cache,
            bus,
            scorer,
        }
    }
}
