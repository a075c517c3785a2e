use chrono::Utc;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::{ClientConfig, Message};
use tracing::{error, info, instrument, warn};

use crate::bus::DlqEnvelope;
use crate::config::BusConfig;
use crate::domain::truncate_error_message;
use crate::scorer::is_violation;
use crate::state::AppState;

/// Builds `<base>: <detail>` when `detail` is non-empty after trimming,
/// else just `base`.
fn compose_error(base: &str, detail: impl std::fmt::Display) -> String {
    let detail = detail.to_string();
    if detail.trim().is_empty() {
        base.to_string()
    } else {
        format!("{base}: {}", detail.trim())
    }
}

/// Parses the moderation-request body, requiring a JSON object with a
/// non-negative integer `item_id`. Unknown fields are tolerated.
fn decode_item_id(payload: &[u8]) -> std::result::Result<i64, String> {
    let value: serde_json::Value =
        serde_json::from_slice(payload).map_err(|e| e.to_string())?;
    let item_id = value
        .as_object()
        .and_then(|obj| obj.get("item_id"))
        .and_then(serde_json::Value::as_i64)
        .ok_or_else(|| "missing or non-integer `item_id`".to_string())?;
    if item_id < 0 {
        return Err("`item_id` must be non-negative".to_string());
    }
    Ok(item_id)
}

async fn send_to_dlq(state: &AppState, payload: &[u8], error: &str) {
    let envelope = DlqEnvelope::new(payload, error, Utc::now());
    if let Err(e) = state.bus.send_dlq(&envelope).await {
        error!(error = %e, "failed to publish dead-letter envelope");
    }
}

/// Processes one raw message body end to end: decode, resolve listing,
/// score, commit terminal state, dead-letter on failure.
///
/// Never returns an error: every failure mode is handled in place by a
/// DLQ send and, when a task is known to exist, a `claim_and_fail` write.
/// A discarded duplicate (no pending row left to claim) is logged and
/// acknowledged without a DLQ entry.
#[instrument(skip(state, payload))]
pub async fn handle_message(state: &AppState, payload: &[u8]) {
    let item_id = match decode_item_id(payload) {
        Ok(id) => id,
        Err(detail) => {
            warn!(error = %detail, "malformed moderation request payload");
            send_to_dlq(state, payload, "Invalid message payload").await;
            return;
        }
    };

    let listing = match state.store.select_listing(item_id).await {
        Ok(Some(listing)) => listing,
        Ok(None) => {
            let message = "Advertisement not found";
            fail_task(state, item_id, message).await;
            send_to_dlq(state, payload, message).await;
            return;
        }
        Err(e) => {
            let message = compose_error("Database read failed", e);
            fail_task(state, item_id, &message).await;
            send_to_dlq(state, payload, &message).await;
            return;
        }
    };

    let features = listing.feature_vector();
    let probability = match state.scorer.score(features).await {
        Ok(p) => p,
        Err(e) => {
            let message = compose_error("Prediction failed", e);
            fail_task(state, item_id, &message).await;
            send_to_dlq(state, payload, &message).await;
            return;
        }
    };

    let violation = is_violation(probability);
    match state
        .store
        .claim_and_complete(item_id, violation, probability)
        .await
    {
        Ok(Some(task_id)) => {
            info!(item_id, task_id, probability, violation, "task completed");
        }
        Ok(None) => {
            info!(item_id, "no pending task to claim, discarding duplicate");
        }
        Err(e) => {
            error!(item_id, error = %e, "failed to commit completed task, routing to dead letter");
            send_to_dlq(state, payload, &compose_error("Commit failed", e)).await;
        }
    }
}

/// `claim_and_fail` is itself best-effort: if it errors the DLQ entry
/// still records the original cause, so failures here are only logged.
async fn fail_task(state: &AppState, item_id: i64, message: &str) {
    let truncated = truncate_error_message(message);
    match state.store.claim_and_fail(item_id, &truncated).await {
        Ok(Some(task_id)) => {
            warn!(item_id, task_id, message, "task failed");
        }
        Ok(None) => {
            info!(item_id, "no pending task to fail, discarding duplicate");
        }
        Err(e) => {
            error!(item_id, error = %e, "claim_and_fail itself failed");
        }
    }
}

/// Runs the worker's consume loop against the moderation topic, in the
/// configured consumer group, forever.
pub async fn run_worker(state: AppState, config: &BusConfig) -> anyhow::Result<()> {
    let consumer: StreamConsumer = ClientConfig::new()
        .set("bootstrap.servers", &config.bootstrap_servers)
        .set("group.id", &config.group_id)
        .set("auto.offset.reset", &config.auto_offset_reset)
        .set("enable.auto.commit", "true")
        .create()?;
    consumer.subscribe(&[config.topic.as_str()])?;

    info!(topic = %config.topic, group = %config.group_id, "moderation worker consuming");
    loop {
        match consumer.recv().await {
            Ok(message) => {
                let payload = message.payload().unwrap_or_default().to_vec();
                handle_message(&state, &payload).await;
            }
            Err(e) => {
                error!(error = %e, "error receiving from moderation topic");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::TaskStatus;
    use crate::store::TaskStore;
    use crate::test_support::{FakeBus, FakeCache, FakeScorer, FakeTaskStore};

    fn state_with(store: FakeTaskStore, scorer: FakeScorer) -> (AppState, Arc<FakeBus>) {
        let cache = Arc::new(FakeCache::new());
        let bus = Arc::new(FakeBus::new());
        let state = AppState::new(
            Arc::new(store),
            cache.clone(),
            cache,
            bus.clone(),
            Arc::new(scorer),
        );
        (state, bus)
    }

    #[tokio::test]
    async fn malformed_payload_goes_straight_to_dlq() {
        let (state, bus) = state_with(FakeTaskStore::new(), FakeScorer::returning(0.0));
        handle_message(&state, b"not json").await;
        let dlqs = bus.dlqs.lock().unwrap();
        assert_eq!(dlqs.len(), 1);
        assert_eq!(dlqs[0].error, "Invalid message payload");
    }

    #[tokio::test]
    async fn missing_listing_fails_and_dead_letters() {
        let (state, bus) = state_with(FakeTaskStore::new(), FakeScorer::returning(0.0));
        let payload = serde_json::to_vec(&serde_json::json!({"item_id": 7})).unwrap();

        handle_message(&state, &payload).await;

        let dlqs = bus.dlqs.lock().unwrap();
        assert_eq!(dlqs[0].error, "Advertisement not found");
    }

    #[tokio::test]
    async fn scorer_failure_fails_the_task_and_dead_letters() {
        let store = FakeTaskStore::new();
        store.create_user(1, true).await.unwrap();
        store.create_listing(1, 7, "n", "d", 1, 1).await.unwrap();
        let pending = store.create_pending(7).await.unwrap();

        let (state, bus) = state_with(store, FakeScorer::failing("model exploded"));
        let payload = serde_json::to_vec(&serde_json::json!({"item_id": 7})).unwrap();
        handle_message(&state, &payload).await;

        assert_eq!(bus.dlqs.lock().unwrap()[0].error, "Prediction failed: model exploded");
        let task = state.store.get_task(pending.id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error_message.as_deref(), Some("Prediction failed: model exploded"));
    }

    #[tokio::test]
    async fn happy_path_completes_with_threshold_applied() {
        let store = FakeTaskStore::new();
        store.create_user(1, true).await.unwrap();
        store.create_listing(1, 7, "n", "a description", 1, 2).await.unwrap();
        let pending = store.create_pending(7).await.unwrap();

        let (state, bus) = state_with(store, FakeScorer::returning(0.91));
        let payload = serde_json::to_vec(&serde_json::json!({"item_id": 7})).unwrap();
        handle_message(&state, &payload).await;

        assert!(bus.dlqs.lock().unwrap().is_empty());
        let task = state.store.get_task(pending.id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.is_violation, Some(true));
        assert_eq!(task.probability, Some(0.91));
        assert!(task.processed_at.is_some());
    }

    #[tokio::test]
    async fn duplicate_delivery_with_no_pending_row_is_discarded_without_dlq() {
        let store = FakeTaskStore::new();
        store.create_user(1, true).await.unwrap();
        store.create_listing(1, 7, "n", "d", 1, 1).await.unwrap();
        // No create_pending call: nothing pending for item 7.

        let (state, bus) = state_with(store, FakeScorer::returning(0.2));
        let payload = serde_json::to_vec(&serde_json::json!({"item_id": 7})).unwrap();
        handle_message(&state, &payload).await;

        assert!(bus.dlqs.lock().unwrap().is_empty());
    }

    #[test]
    fn error_message_composition_omits_empty_detail() {
        assert_eq!(compose_error("Prediction failed", ""), "Prediction failed");
        assert_eq!(
            compose_error("Prediction failed", "timeout"),
            "Prediction failed: timeout"
        );
    }
}
