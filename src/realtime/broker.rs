use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::realtime::errors::BrokerError;

const TOPIC_PREFIX: &str = "table_updates:";

/// Broker topic carrying change events for one table.
pub fn topic_for(table_id: Uuid) -> String {
    format!("{TOPIC_PREFIX}{table_id}")
}

pub fn table_from_topic(topic: &str) -> Option<Uuid> {
    topic
        .strip_prefix(TOPIC_PREFIX)
        .and_then(|id| Uuid::parse_str(id).ok())
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrokerMessage {
    pub topic: String,
    pub payload: Bytes,
}

/// Publish/subscribe port. One value is one broker client: its
/// subscriptions and inbound message stream are its own.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), BrokerError>;

    async fn subscribe(&self, topic: &str) -> Result<(), BrokerError>;

    async fn unsubscribe(&self, topic: &str) -> Result<(), BrokerError>;

    /// Next message on any subscribed topic, in per-topic publish order.
    /// `None` once the client is disconnected.
    async fn next_message(&self) -> Option<BrokerMessage>;
}
