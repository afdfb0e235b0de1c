use async_trait::async_trait;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A message to be published: an opaque body plus string attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMessage {
    pub body: String,
    pub attributes: BTreeMap<String, String>,
}

impl OutgoingMessage {
    pub fn new(body: String) -> Self {
        Self {
            body,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }
}

/// Envelope stored on the queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueueMessage {
    pub message_id: String,
    pub body: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Number of earlier deliveries that ended in a nack.
    #[serde(default)]
    pub receive_count: u32,
}

impl QueueMessage {
    pub fn from_outgoing(message: &OutgoingMessage) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            body: message.body.clone(),
            attributes: message.attributes.clone(),
            receive_count: 0,
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// A received message together with the receipt needed to settle it.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message: QueueMessage,
    pub receipt: String,
}

/// At-least-once work queue.
///
/// Every received delivery must be settled with exactly one of `ack`,
/// `nack` or `dead_letter`; unsettled deliveries stay in flight.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Publish a message, returning its id.
    async fn publish(&self, message: &OutgoingMessage) -> Result<String, QueueError>;

    /// Receive up to `max` messages without blocking.
    async fn receive(&self, max: usize) -> Result<Vec<Delivery>, QueueError>;

    /// Processing succeeded; forget the message.
    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError>;

    /// Processing failed; redeliver, or dead-letter once the receive limit is hit.
    async fn nack(&self, delivery: &Delivery) -> Result<(), QueueError>;

    /// Move a message straight to the dead-letter list.
    async fn dead_letter(&self, delivery: &Delivery) -> Result<(), QueueError>;

    /// Messages waiting to be received.
    async fn depth(&self) -> Result<u64, QueueError>;

    async fn health_check(&self) -> Result<(), QueueError>;
}

/// Redis-backed work queue: a ready list, a processing list and a dead-letter list.
pub struct RedisQueue {
    client: redis::Client,
    queue_key: String,
    processing_key: String,
    dead_letter_key: String,
    max_receive_count: u32,
}

impl RedisQueue {
    pub fn new(redis_url: &str, queue_name: &str, max_receive_count: u32) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url).map_err(QueueError::Redis)?;
        Ok(Self {
            client,
            queue_key: queue_name.to_string(),
            processing_key: format!("{queue_name}:processing"),
            dead_letter_key: format!("{queue_name}:dead_letter"),
            max_receive_count: max_receive_count.max(1),
        })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, QueueError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)
    }

    /// Atomically push `payload` onto `target` and drop the in-flight copy.
    async fn settle_into(&self, target: &str, payload: &str, receipt: &str) -> Result<(), QueueError> {
        let mut conn = self.connection().await?;
        redis::pipe()
            .atomic()
            .lpush(target, payload)
            .ignore()
            .lrem(&self.processing_key, 1, receipt)
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(QueueError::Redis)
    }

    /// Messages currently parked in the dead-letter list.
    pub async fn dead_letter_depth(&self) -> Result<u64, QueueError> {
        let mut conn = self.connection().await?;
        let depth: u64 = conn.llen(&self.dead_letter_key).await.map_err(QueueError::Redis)?;
        Ok(depth)
    }
}

#[async_trait]
impl WorkQueue for RedisQueue {
    async fn publish(&self, message: &OutgoingMessage) -> Result<String, QueueError> {
        let envelope = QueueMessage::from_outgoing(message);
        let payload = serde_json::to_string(&envelope).map_err(QueueError::Serialize)?;

        let mut conn = self.connection().await?;
        conn.lpush::<_, _, ()>(&self.queue_key, &payload)
            .await
            .map_err(QueueError::Redis)?;

        Ok(envelope.message_id)
    }

    async fn receive(&self, max: usize) -> Result<Vec<Delivery>, QueueError> {
        let mut conn = self.connection().await?;
        let mut deliveries = Vec::new();

        while deliveries.len() < max {
            let raw: Option<String> = conn
                .rpoplpush(&self.queue_key, &self.processing_key)
                .await
                .map_err(QueueError::Redis)?;

            let Some(raw) = raw else { break };

            match serde_json::from_str::<QueueMessage>(&raw) {
                Ok(message) => deliveries.push(Delivery {
                    message,
                    receipt: raw,
                }),
                Err(e) => {
                    tracing::warn!(error = %e, "Unreadable queue envelope, dead-lettering");
                    self.settle_into(&self.dead_letter_key, &raw, &raw).await?;
                }
            }
        }

        Ok(deliveries)
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let mut conn = self.connection().await?;
        conn.lrem::<_, _, ()>(&self.processing_key, 1, &delivery.receipt)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    async fn nack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let mut message = delivery.message.clone();
        message.receive_count += 1;
        let payload = serde_json::to_string(&message).map_err(QueueError::Serialize)?;

        let target = if message.receive_count >= self.max_receive_count {
            tracing::warn!(
                message_id = %message.message_id,
                receive_count = message.receive_count,
                "Receive limit reached, dead-lettering message"
            );
            &self.dead_letter_key
        } else {
            &self.queue_key
        };

        self.settle_into(target, &payload, &delivery.receipt).await
    }

    async fn dead_letter(&self, delivery: &Delivery) -> Result<(), QueueError> {
        self.settle_into(&self.dead_letter_key, &delivery.receipt, &delivery.receipt)
            .await
    }

    async fn depth(&self) -> Result<u64, QueueError> {
        let mut conn = self.connection().await?;
        let depth: u64 = conn.llen(&self.queue_key).await.map_err(QueueError::Redis)?;
        Ok(depth)
    }

    async fn health_check(&self) -> Result<(), QueueError> {
        let mut conn = self.connection().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Queue unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_keeps_attributes() {
        let outgoing = OutgoingMessage::new("{}".to_string())
            .with_attribute("jobId", "J1")
            .with_attribute("itemId", "a");
        let envelope = QueueMessage::from_outgoing(&outgoing);

        assert_eq!(envelope.attribute("jobId"), Some("J1"));
        assert_eq!(envelope.attribute("itemId"), Some("a"));
        assert_eq!(envelope.receive_count, 0);
        assert!(!envelope.message_id.is_empty());
    }

    #[test]
    fn test_envelope_wire_format() {
        let raw = r#"{"messageId":"m1","body":"{}","attributes":{"jobId":"J1"},"receiveCount":2}"#;
        let envelope: QueueMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.receive_count, 2);
        assert_eq!(envelope.attribute("jobId"), Some("J1"));

        let minimal: QueueMessage = serde_json::from_str(r#"{"messageId":"m2","body":"x"}"#).unwrap();
        assert_eq!(minimal.receive_count, 0);
        assert!(minimal.attributes.is_empty());
    }

    #[test]
    fn test_redis_key_layout() {
        let queue = RedisQueue::new("redis://127.0.0.1/", "jobs:items", 0).unwrap();
        assert_eq!(queue.processing_key, "jobs:items:processing");
        assert_eq!(queue.dead_letter_key, "jobs:items:dead_letter");
        assert_eq!(queue.max_receive_count, 1);
    }
}
