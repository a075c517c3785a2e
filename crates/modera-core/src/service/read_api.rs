use tracing::instrument;

use crate::cache::{PredictionPayload, TaskStatusPayload};
use crate::domain::TaskStatus;
use crate::error::{ModeraError, Result};
use crate::scorer::is_violation;
use crate::state::AppState;

/// Response shape of [`get_task_status`].
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TaskStatusView {
    pub task_id: i64,
    pub status: TaskStatus,
    pub is_violation: Option<bool>,
    pub probability: Option<f64>,
}

/// Response shape of [`simple_predict`].
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct PredictResult {
    pub is_valid: bool,
    pub probability: f64,
}

/// Cache-aside read of a task's status.
///
/// Hits the task cache first; on miss (including a cached payload missing
/// `task_id`/`status`, which the cache layer already treats as a miss)
/// falls through to the store and repopulates the cache.
#[instrument(skip(state))]
pub async fn get_task_status(state: &AppState, task_id: i64) -> Result<TaskStatusView> {
    if let Some(cached) = state.task_cache.get(task_id).await {
        let status = cached.status.parse::<TaskStatus>().map_err(|_| {
            ModeraError::StorageUnavailable(anyhow::anyhow!(
                "cached task {task_id} has unrecognized status `{}`",
                cached.status
            ))
        })?;
        return Ok(TaskStatusView {
            task_id: cached.task_id,
            status,
            is_violation: cached.is_violation,
            probability: cached.probability,
        });
    }

    let task = state
        .store
        .get_task(task_id)
        .await?
        .ok_or_else(|| ModeraError::NotFound(format!("task {task_id}")))?;

    let payload = TaskStatusPayload {
        task_id: task.id,
        status: task.status.as_str().to_string(),
        is_violation: task.is_violation,
        probability: task.probability,
    };
    state.task_cache.set(task_id, &payload).await;

    Ok(TaskStatusView {
        task_id: task.id,
        status: task.status,
        is_violation: task.is_violation,
        probability: task.probability,
    })
}

/// Cache-aside synchronous prediction by `item_id`.
#[instrument(skip(state))]
pub async fn simple_predict(state: &AppState, item_id: i64) -> Result<PredictResult> {
    if let Some(cached) = state.prediction_cache.get(item_id).await {
        return Ok(PredictResult {
            is_valid: cached.is_valid,
            probability: cached.probability,
        });
    }

    let listing = state
        .store
        .select_listing(item_id)
        .await?
        .ok_or_else(|| ModeraError::NotFound(format!("listing {item_id}")))?;

    let probability = state.scorer.score(listing.feature_vector()).await?;
    let is_valid = is_violation(probability);

    state
        .prediction_cache
        .set(
            item_id,
            &PredictionPayload {
                is_valid,
                probability,
            },
        )
        .await;

    Ok(PredictResult {
        is_valid,
        probability,
    })
}
