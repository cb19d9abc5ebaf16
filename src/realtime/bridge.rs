use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::realtime::broker::{Broker, BrokerMessage, table_from_topic, topic_for};
use crate::realtime::registry::RegistryHandle;

const LOG_TARGET: &str = "realtime::bridge";

/// Delay before retrying a reconcile that hit broker errors.
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Keeps broker subscriptions in line with the registry's aggregate
/// interest and forwards broker messages to the registry. It is the only
/// writer of the subscribed set.
pub struct BrokerBridge {
    broker: Arc<dyn Broker>,
    registry: RegistryHandle,
    signals: mpsc::Receiver<()>,
    subscribed: HashSet<Uuid>,
    retry_pending: bool,
}

impl BrokerBridge {
    pub fn new(
        broker: Arc<dyn Broker>,
        registry: RegistryHandle,
        signals: mpsc::Receiver<()>,
    ) -> Self {
        Self {
            broker,
            registry,
            signals,
            subscribed: HashSet::new(),
            retry_pending: false,
        }
    }

    /// Runs until `shutdown` flips or its sender is dropped, then
    /// unsubscribes every topic.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(target: LOG_TARGET, "Broker bridge started");
        let broker = Arc::clone(&self.broker);

        while !*shutdown.borrow() {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                signal = self.signals.recv() => match signal {
                    Some(()) => self.reconcile().await,
                    None => break,
                },
                message = broker.next_message() => match message {
                    Some(message) => self.forward(message).await,
                    None => {
                        warn!(target: LOG_TARGET, "Broker stream ended");
                        break;
                    }
                },
                _ = tokio::time::sleep(RETRY_DELAY), if self.retry_pending => {
                    self.reconcile().await;
                }
            }
        }

        self.unsubscribe_all().await;
        info!(target: LOG_TARGET, "Broker bridge stopped");
    }

    /// Subscribes newly desired topics and drops stale ones. Failed
    /// operations leave the set unchanged and are retried.
    async fn reconcile(&mut self) {
        let desired = match self.registry.desired_tables().await {
            Ok(desired) => desired,
            Err(e) => {
                debug!(target: LOG_TARGET, error = %e, "Registry unavailable; skipping reconcile");
                return;
            }
        };

        let mut failed = false;
        let added: Vec<Uuid> = desired.difference(&self.subscribed).copied().collect();
        for table_id in added {
            let topic = topic_for(table_id);
            match self.broker.subscribe(&topic).await {
                Ok(()) => {
                    info!(target: LOG_TARGET, topic = %topic, "Subscribed");
                    self.subscribed.insert(table_id);
                }
                Err(e) => {
                    warn!(target: LOG_TARGET, topic = %topic, error = %e, "Subscribe failed");
                    failed = true;
                }
            }
        }

        let stale: Vec<Uuid> = self.subscribed.difference(&desired).copied().collect();
        for table_id in stale {
            let topic = topic_for(table_id);
            match self.broker.unsubscribe(&topic).await {
                Ok(()) => {
                    info!(target: LOG_TARGET, topic = %topic, "Unsubscribed");
                    self.subscribed.remove(&table_id);
                }
                Err(e) => {
                    warn!(target: LOG_TARGET, topic = %topic, error = %e, "Unsubscribe failed");
                    failed = true;
                }
            }
        }

        self.retry_pending = failed;
    }

    async fn forward(&self, message: BrokerMessage) {
        let Some(table_id) = table_from_topic(&message.topic) else {
            debug!(target: LOG_TARGET, topic = %message.topic, "Ignoring foreign topic");
            return;
        };
        if let Err(e) = self.registry.dispatch(table_id, message.payload).await {
            debug!(target: LOG_TARGET, %table_id, error = %e, "Dropping event; registry stopped");
        }
    }

    async fn unsubscribe_all(&mut self) {
        for table_id in self.subscribed.drain() {
            let topic = topic_for(table_id);
            if let Err(e) = self.broker.unsubscribe(&topic).await {
                warn!(target: LOG_TARGET, topic = %topic, error = %e, "Unsubscribe on shutdown failed");
            }
        }
    }
}
