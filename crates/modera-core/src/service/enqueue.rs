use tracing::instrument;

use crate::domain::TaskStatus;
use crate::error::{ModeraError, Result};
use crate::state::AppState;

/// Response shape of [`enqueue`].
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct EnqueueOutcome {
    pub task_id: i64,
    pub status: TaskStatus,
    pub message: &'static str,
}

/// Resolves the listing, creates-or-reuses a pending task, and publishes a
/// moderation request.
///
/// When `create_pending` returns an already-existing pending or completed
/// task, a request is still published: the worker's claim discipline
/// ensures a duplicate finds no pending row to claim and discards it
/// cleanly, so this never double-completes a task.
#[instrument(skip(state))]
pub async fn enqueue(state: &AppState, item_id: i64) -> Result<EnqueueOutcome> {
    state
        .store
        .select_listing(item_id)
        .await?
        .ok_or_else(|| ModeraError::NotFound(format!("listing {item_id}")))?;

    let task = state.store.create_pending(item_id).await?;

    state
        .bus
        .send_request(item_id)
        .await
        .map_err(ModeraError::BusUnavailable)?;

    Ok(EnqueueOutcome {
        task_id: task.id,
        status: task.status,
        message: "Moderation request accepted",
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::test_support::{FakeBus, FakeCache, FakeScorer, FakeTaskStore};

    fn state_with(store: FakeTaskStore, bus: FakeBus) -> AppState {
        let cache = Arc::new(FakeCache::new());
        AppState::new(
            Arc::new(store),
            cache.clone(),
            cache,
            Arc::new(bus),
            Arc::new(FakeScorer::returning(0.1)),
        )
    }

    #[tokio::test]
    async fn missing_listing_is_not_found() {
        let state = state_with(FakeTaskStore::new(), FakeBus::new());
        let err = enqueue(&state, 42).await.unwrap_err();
        assert!(matches!(err, ModeraError::NotFound(_)));
    }

    #[tokio::test]
    async fn publishes_a_request_even_for_an_already_pending_task() {
        let store = FakeTaskStore::new();
        store.create_user(1, true).await.unwrap();
        store
            .create_listing(1, 42, "n", "d", 1, 1)
            .await
            .unwrap();
        let existing = store.create_pending(42).await.unwrap();

        let bus = FakeBus::new();
        let state = state_with(store, bus);

        let outcome = enqueue(&state, 42).await.unwrap();
        assert_eq!(outcome.task_id, existing.id);
        assert_eq!(outcome.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn bus_failure_surfaces_as_bus_unavailable() {
        let store = FakeTaskStore::new();
        store.create_user(1, true).await.unwrap();
        store
            .create_listing(1, 42, "n", "d", 1, 1)
            .await
            .unwrap();

        let bus = FakeBus::new();
        bus.fail_requests.store(true, std::sync::atomic::Ordering::SeqCst);
        let state = state_with(store, bus);

        let err = enqueue(&state, 42).await.unwrap_err();
        assert!(matches!(err, ModeraError::BusUnavailable(_)));
    }
}
