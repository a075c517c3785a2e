mod redis_cache;

pub use redis_cache::RedisCache;

use serde::{Deserialize, Serialize};

use crate::domain::TaskStatus;

/// Cached shape for `prediction:<item_id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionPayload {
    pub is_valid: bool,
    pub probability: f64,
}

/// Cached shape for `moderation_result:<task_id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatusPayload {
    pub task_id: i64,
    pub status: String,
    #[serde(default)]
    pub is_violation: Option<bool>,
    #[serde(default)]
    pub probability: Option<f64>,
}

impl TaskStatusPayload {
    /// A payload missing `task_id`/`status` is treated as a miss. `serde`
    /// enforces their presence at deserialization time, so any value that
    /// parses into this type already satisfies that rule.
    #[must_use]
    pub fn ttl_secs(&self) -> u64 {
        match self.status.as_str() {
            "completed" | "failed" => TERMINAL_TTL_SECS,
            _ => PENDING_TTL_SECS,
        }
    }
}

pub const PREDICTION_TTL_SECS: u64 = 24 * 60 * 60;
pub const PENDING_TTL_SECS: u64 = 15;
pub const TERMINAL_TTL_SECS: u64 = 24 * 60 * 60;

#[must_use]
pub fn ttl_for_status(status: TaskStatus) -> u64 {
    match status {
        TaskStatus::Pending => PENDING_TTL_SECS,
        TaskStatus::Completed | TaskStatus::Failed => TERMINAL_TTL_SECS,
    }
}

/// Best-effort cache of `prediction:<item_id>` entries. Every failure is
/// logged and swallowed by the implementation; callers always fall
/// through to the authoritative store on `None`.
#[async_trait::async_trait]
pub trait PredictionCache: Send + Sync + 'static {
    async fn get(&self, item_id: i64) -> Option<PredictionPayload>;
    async fn set(&self, item_id: i64, payload: &PredictionPayload);
    async fn delete(&self, item_id: i64);
}

/// Best-effort cache of `moderation_result:<task_id>` entries, with TTL
/// driven by the cached task's status.
#[async_trait::async_trait]
pub trait TaskCache: Send + Sync + 'static {
    async fn get(&self, task_id: i64) -> Option<TaskStatusPayload>;
    async fn set(&self, task_id: i64, payload: &TaskStatusPayload);
    async fn delete(&self, task_id: i64);
}
