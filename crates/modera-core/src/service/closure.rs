use tracing::instrument;

use crate::error::{ModeraError, Result};
use crate::state::AppState;

/// Result of [`close_listing`] when the listing existed.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ClosureOutcome {
    pub item_id: i64,
    pub closed_task_ids: Vec<i64>,
}

/// Hard-deletes a listing and its tasks, then invalidates the caches the
/// now-gone rows populated.
///
/// Cache-delete failures are already swallowed inside the cache
/// implementation; this function cannot fail because of them.
#[instrument(skip(state))]
pub async fn close_listing(state: &AppState, item_id: i64) -> Result<ClosureOutcome> {
    let (item_id, task_ids) = state
        .store
        .close_listing(item_id)
        .await?
        .ok_or_else(|| ModeraError::NotFound(format!("listing {item_id}")))?;

    state.prediction_cache.delete(item_id).await;
    for task_id in &task_ids {
        state.task_cache.delete(*task_id).await;
    }

    Ok(ClosureOutcome {
        item_id,
        closed_task_ids: task_ids,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cache::{PredictionCache, PredictionPayload, TaskCache, TaskStatusPayload};
    use crate::store::TaskStore;
    use crate::test_support::{FakeBus, FakeCache, FakeScorer, FakeTaskStore};

    #[tokio::test]
    async fn closure_invalidates_prediction_and_task_caches() {
        let store = FakeTaskStore::new();
        store.create_user(1, true).await.unwrap();
        store.create_listing(1, 7, "n", "d", 1, 1).await.unwrap();
        let pending = store.create_pending(7).await.unwrap();

        let cache = Arc::new(FakeCache::new());
        PredictionCache::set(&*cache, 7, &PredictionPayload { is_valid: false, probability: 0.1 }).await;
        TaskCache::set(
            &*cache,
            pending.id,
            &TaskStatusPayload {
                task_id: pending.id,
                status: "pending".to_string(),
                is_violation: None,
                probability: None,
            },
        )
        .await;

        let state = AppState::new(
            Arc::new(store),
            cache.clone(),
            cache.clone(),
            Arc::new(FakeBus::new()),
            Arc::new(FakeScorer::returning(0.0)),
        );

        let outcome = close_listing(&state, 7).await.unwrap();
        assert_eq!(outcome.closed_task_ids, vec![pending.id]);
        assert!(PredictionCache::get(&*cache, 7).await.is_none());
        assert!(TaskCache::get(&*cache, pending.id).await.is_none());
    }

    #[tokio::test]
    async fn closing_an_absent_listing_is_not_found() {
        let cache = Arc::new(FakeCache::new());
        let state = AppState::new(
            Arc::new(FakeTaskStore::new()),
            cache.clone(),
            cache,
            Arc::new(FakeBus::new()),
            Arc::new(FakeScorer::returning(0.0)),
        );
        let err = close_listing(&state, 7).await.unwrap_err();
        assert!(matches!(err, ModeraError::NotFound(_)));
    }
}
