mod kafka;

pub use kafka::KafkaBusProducer;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of the moderation request message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationRequest {
    pub item_id: i64,
    pub timestamp: DateTime<Utc>,
}

/// Body of the dead-letter envelope.
#[derive(Debug, Clone, Serialize)]
pub struct DlqEnvelope {
    pub original_message: Value,
    pub error: String,
    pub timestamp: DateTime<Utc>,
    pub retry_count: i64,
}

impl DlqEnvelope {
    /// Builds an envelope from a possibly-undecodable original payload.
    ///
    /// `original_message` is the decoded JSON object when `raw_payload`
    /// parses as JSON, otherwise `{"raw_payload": <utf8-replacement
    /// decoded string>}`. `retry_count` is `original_message.retry_count
    /// + 1` when that field is a non-negative integer, else `1`.
    #[must_use]
    pub fn new(raw_payload: &[u8], error: impl Into<String>, now: DateTime<Utc>) -> Self {
        let original_message = match serde_json::from_slice::<Value>(raw_payload) {
            Ok(value @ Value::Object(_)) => value,
            _ => {
                let text = String::from_utf8_lossy(raw_payload).into_owned();
                serde_json::json!({ "raw_payload": text })
            }
        };
        let retry_count = original_message
            .get("retry_count")
            .and_then(Value::as_i64)
            .filter(|n| *n >= 0)
            .map_or(1, |n| n + 1);
        Self {
            original_message,
            error: error.into(),
            timestamp: now,
            retry_count,
        }
    }

    /// Serializes this envelope with a second-precision RFC-3339 `Z`
    /// timestamp.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "original_message": self.original_message,
            "error": self.error,
            "timestamp": self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            "retry_count": self.retry_count,
        })
    }
}

/// Publishes moderation requests and dead-letter envelopes.
///
/// `send_and_wait` semantics are required: implementations must not
/// fire-and-forget, so publish failures can surface as `BusUnavailable`.
#[async_trait::async_trait]
pub trait BusProducer: Send + Sync + 'static {
    async fn send_request(&self, item_id: i64) -> anyhow::Result<()>;

    async fn send_dlq(&self, envelope: &DlqEnvelope) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_retry_count_from_a_well_formed_previous_envelope() {
        let now = Utc::now();
        let raw = serde_json::to_vec(&serde_json::json!({
            "item_id": 42,
            "retry_count": 2,
        }))
        .unwrap();
        let envelope = DlqEnvelope::new(&raw, "Prediction failed", now);
        assert_eq!(envelope.retry_count, 3);
        assert_eq!(envelope.original_message["item_id"], 42);
    }

    #[test]
    fn defaults_retry_count_to_one_when_absent_or_negative() {
        let now = Utc::now();
        let raw = serde_json::to_vec(&serde_json::json!({"item_id": 1})).unwrap();
        assert_eq!(DlqEnvelope::new(&raw, "e", now).retry_count, 1);

        let raw = serde_json::to_vec(&serde_json::json!({"item_id": 1, "retry_count": -3})).unwrap();
        assert_eq!(DlqEnvelope::new(&raw, "e", now).retry_count, 1);
    }

    #[test]
    fn falls_back_to_raw_payload_on_undecodable_bytes() {
        let now = Utc::now();
        let raw: &[u8] = b"\xff\xfenot json";
        let envelope = DlqEnvelope::new(raw, "Invalid message payload", now);
        assert!(envelope.original_message["raw_payload"].is_string());
        assert_eq!(envelope.retry_count, 1);
    }

    #[test]
    fn serializes_timestamp_at_second_precision_with_trailing_z() {
        let now = Utc::now();
        let raw = serde_json::to_vec(&serde_json::json!({"item_id": 1})).unwrap();
        let envelope = DlqEnvelope::new(&raw, "e", now);
        let ts = envelope.to_json()["timestamp"].as_str().unwrap().to_string();
        assert!(ts.ends_with('Z'));
        assert!(!ts.contains('.'));
    }
}
