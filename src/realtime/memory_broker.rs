use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tracing::trace;

use crate::realtime::broker::{Broker, BrokerMessage};
use crate::realtime::errors::BrokerError;

const LOG_TARGET: &str = "realtime::memory_broker";

struct ClientEntry {
    topics: HashSet<String>,
    tx: mpsc::UnboundedSender<BrokerMessage>,
}

#[derive(Default)]
struct Hub {
    clients: Mutex<HashMap<u64, ClientEntry>>,
    next_client: AtomicU64,
    unavailable: AtomicBool,
}

/// In-process broker. Each [`MemoryBroker::connect`] call yields an
/// independent client, standing in for one backend process.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    hub: Arc<Hub>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self) -> MemoryBrokerClient {
        let id = self.hub.next_client.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.hub.clients.lock().insert(
            id,
            ClientEntry {
                topics: HashSet::new(),
                tx,
            },
        );
        MemoryBrokerClient {
            id,
            hub: Arc::clone(&self.hub),
            rx: AsyncMutex::new(rx),
        }
    }

    /// Number of clients currently subscribed to `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.hub
            .clients
            .lock()
            .values()
            .filter(|c| c.topics.contains(topic))
            .count()
    }

    /// Simulates an outage: every operation fails until switched back.
    pub fn set_available(&self, available: bool) {
        self.hub.unavailable.store(!available, Ordering::Release);
    }
}

pub struct MemoryBrokerClient {
    id: u64,
    hub: Arc<Hub>,
    rx: AsyncMutex<mpsc::UnboundedReceiver<BrokerMessage>>,
}

impl MemoryBrokerClient {
    fn check_available(&self) -> Result<(), BrokerError> {
        if self.hub.unavailable.load(Ordering::Acquire) {
            return Err(BrokerError::Unavailable("in-process broker is down".into()));
        }
        Ok(())
    }

    fn set_subscribed(&self, topic: &str, subscribed: bool) -> Result<(), BrokerError> {
        self.check_available()?;
        let mut clients = self.hub.clients.lock();
        let entry = clients
            .get_mut(&self.id)
            .ok_or_else(|| BrokerError::Unavailable("client disconnected".into()))?;
        if subscribed {
            entry.topics.insert(topic.to_string());
        } else {
            entry.topics.remove(topic);
        }
        Ok(())
    }
}

#[async_trait]
impl Broker for MemoryBrokerClient {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), BrokerError> {
        self.check_available()?;
        // Delivery happens under the lock so every subscriber sees one
        // topic's messages in publish order.
        let clients = self.hub.clients.lock();
        let mut delivered = 0usize;
        for entry in clients.values().filter(|c| c.topics.contains(topic)) {
            let message = BrokerMessage {
                topic: topic.to_string(),
                payload: payload.clone(),
            };
            if entry.tx.send(message).is_ok() {
                delivered += 1;
            }
        }
        trace!(target: LOG_TARGET, topic, delivered, "Published");
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<(), BrokerError> {
        self.set_subscribed(topic, true)
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), BrokerError> {
        self.set_subscribed(topic, false)
    }

    async fn next_message(&self) -> Option<BrokerMessage> {
        self.rx.lock().await.recv().await
    }
}

impl Drop for MemoryBrokerClient {
    fn drop(&mut self) {
        self.hub.clients.lock().remove(&self.id);
    }
}
