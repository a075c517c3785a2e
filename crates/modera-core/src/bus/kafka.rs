use std::time::Duration;

use chrono::Utc;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use tracing::debug;

use crate::config::BusConfig;

use super::{BusProducer, DlqEnvelope, ModerationRequest};

/// `rdkafka`-backed [`BusProducer`], publishing plain JSON request and
/// dead-letter bodies via `FutureProducer`.
pub struct KafkaBusProducer {
    producer: FutureProducer,
    topic: String,
    dlq_topic: String,
}

impl std::fmt::Debug for KafkaBusProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaBusProducer")
            .field("topic", &self.topic)
            .field("dlq_topic", &self.dlq_topic)
            .finish_non_exhaustive()
    }
}

impl KafkaBusProducer {
    pub fn new(config: &BusConfig) -> anyhow::Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("message.timeout.ms", "5000")
            .create()?;
        Ok(Self {
            producer,
            topic: config.topic.clone(),
            dlq_topic: config.dlq_topic.clone(),
        })
    }
}

#[async_trait::async_trait]
impl BusProducer for KafkaBusProducer {
    async fn send_request(&self, item_id: i64) -> anyhow::Result<()> {
        let request = ModerationRequest {
            item_id,
            timestamp: Utc::now(),
        };
        let payload = serde_json::to_vec(&request)?;
        let key = item_id.to_string();
        let delivery = self
            .producer
            .send(
                FutureRecord::to(&self.topic).key(&key).payload(&payload),
                Duration::from_secs(5),
            )
            .await;
        match delivery {
            Ok((partition, offset)) => {
                debug!(topic = %self.topic, partition, offset, item_id, "published moderation request");
                Ok(())
            }
            Err((e, _)) => Err(anyhow::anyhow!(e)),
        }
    }

    async fn send_dlq(&self, envelope: &DlqEnvelope) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(&envelope.to_json())?;
        let delivery = self
            .producer
            .send(
                FutureRecord::<(), _>::to(&self.dlq_topic).payload(&payload),
                Duration::from_secs(5),
            )
            .await;
        match delivery {
            Ok((partition, offset)) => {
                debug!(topic = %self.dlq_topic, partition, offset, "published dead-letter envelope");
                Ok(())
            }
            Err((e, _)) => Err(anyhow::anyhow!(e)),
        }
    }
}
