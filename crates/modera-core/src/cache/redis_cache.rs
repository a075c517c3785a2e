use std::time::Duration;

use redis::{aio::ConnectionManager, AsyncCommands};
use tracing::warn;

use crate::config::CacheConfig;

use super::{PredictionCache, PredictionPayload, TaskCache, TaskStatusPayload, PREDICTION_TTL_SECS};

/// Redis-backed implementation of [`PredictionCache`] and [`TaskCache`].
///
/// All operations are best-effort: any Redis error or timeout is logged
/// and swallowed, degrading to a cache miss. The connection is shared and
/// safe for concurrent use.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    read_timeout: Duration,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache").finish_non_exhaustive()
    }
}

impl RedisCache {
    pub async fn connect(config: &CacheConfig) -> anyhow::Result<Self> {
        let client = redis::Client::open(config.connection_url())?;
        let conn = tokio::time::timeout(
            Duration::from_millis(config.connect_timeout_ms),
            client.get_connection_manager(),
        )
        .await??;
        Ok(Self {
            conn,
            read_timeout: Duration::from_millis(config.read_timeout_ms),
        })
    }

    fn prediction_key(item_id: i64) -> String {
        format!("prediction:{item_id}")
    }

    fn task_key(task_id: i64) -> String {
        format!("moderation_result:{task_id}")
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.conn.clone();
        let fut = conn.get::<_, Option<String>>(key);
        match tokio::time::timeout(self.read_timeout, fut).await {
            Ok(Ok(Some(raw))) => match serde_json::from_str::<T>(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(error = %e, key, "cache payload failed to deserialize, treating as miss");
                    None
                }
            },
            Ok(Ok(None)) => None,
            Ok(Err(e)) => {
                warn!(error = %e, key, "cache get failed, degrading to miss");
                None
            }
            Err(_) => {
                warn!(key, "cache get timed out, degrading to miss");
                None
            }
        }
    }

    async fn set_json<T: serde::Serialize + Sync>(&self, key: &str, value: &T, ttl_secs: u64) {
        let Ok(raw) = serde_json::to_string(value) else {
            warn!(key, "failed to serialize cache payload");
            return;
        };
        let mut conn = self.conn.clone();
        let key_owned = key.to_string();
        let fut = async move {
            redis::pipe()
                .set(&key_owned, raw)
                .ignore()
                .expire(&key_owned, ttl_secs as i64)
                .ignore()
                .query_async::<_, ()>(&mut conn)
                .await
        };
        match tokio::time::timeout(self.read_timeout, fut).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, key, "cache set failed"),
            Err(_) => warn!(key, "cache set timed out"),
        }
    }

    async fn delete_key(&self, key: &str) {
        let mut conn = self.conn.clone();
        let fut = conn.del::<_, ()>(key);
        match tokio::time::timeout(self.read_timeout, fut).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, key, "cache delete failed"),
            Err(_) => warn!(key, "cache delete timed out"),
        }
    }
}

#[async_trait::async_trait]
impl PredictionCache for RedisCache {
    async fn get(&self, item_id: i64) -> Option<PredictionPayload> {
        self.get_json(&Self::prediction_key(item_id)).await
    }

    async fn set(&self, item_id: i64, payload: &PredictionPayload) {
        self.set_json(&Self::prediction_key(item_id), payload, PREDICTION_TTL_SECS)
            .await;
    }

    async fn delete(&self, item_id: i64) {
        self.delete_key(&Self::prediction_key(item_id)).await;
    }
}

#[async_trait::async_trait]
impl TaskCache for RedisCache {
    async fn get(&self, task_id: i64) -> Option<TaskStatusPayload> {
        self.get_json(&Self::task_key(task_id)).await
    }

    async fn set(&self, task_id: i64, payload: &TaskStatusPayload) {
        self.set_json(&Self::task_key(task_id), payload, payload.ttl_secs())
            .await;
    }

    async fn delete(&self, task_id: i64) {
        self.delete_key(&Self::task_key(task_id)).await;
    }
}
