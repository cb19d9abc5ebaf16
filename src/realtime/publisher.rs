use std::sync::Arc;
use tracing::debug;

use crate::realtime::broker::{Broker, topic_for};
use crate::realtime::errors::RealtimeError;
use crate::realtime::event::ChangeEvent;

const LOG_TARGET: &str = "realtime::publisher";

/// Publishes change events to the table's broker topic.
#[derive(Clone)]
pub struct ChangePublisher {
    broker: Arc<dyn Broker>,
}

impl ChangePublisher {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self { broker }
    }

    pub async fn publish(&self, event: &ChangeEvent) -> Result<(), RealtimeError> {
        let payload = event.encode()?;
        let topic = topic_for(event.table_id);
        self.broker.publish(&topic, payload).await?;
        debug!(
            target: LOG_TARGET,
            topic = %topic,
            record_id = %event.record_id,
            kind = ?event.kind,
            "Published change event"
        );
        Ok(())
    }
}
