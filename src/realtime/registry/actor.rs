use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc::{self, Receiver};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::realtime::connection::{CloseReason, ConnectionHandle, ConnectionId, DeliveryError};
use crate::realtime::registry::message::RegistryMessage;

const LOG_TARGET: &str = "realtime::registry";

struct Entry {
    handle: ConnectionHandle,
    interests: HashSet<Uuid>,
}

/// State owned exclusively by the registry actor.
pub struct RegistryState {
    connections: HashMap<ConnectionId, Entry>,
    reconcile: mpsc::Sender<()>,
}

impl RegistryState {
    /// `reconcile` should have capacity 1: a signal already pending covers
    /// any later mutation.
    pub fn new(reconcile: mpsc::Sender<()>) -> Self {
        Self {
            connections: HashMap::new(),
            reconcile,
        }
    }

    fn signal(&self) {
        // Full means a reconcile is already pending.
        let _ = self.reconcile.try_send(());
    }

    fn register(&mut self, handle: ConnectionHandle, tables: HashSet<Uuid>) {
        let id = handle.id();
        debug!(target: LOG_TARGET, connection_id = %id, tables = tables.len(), "Registered");
        self.connections.insert(
            id,
            Entry {
                handle,
                interests: tables,
            },
        );
        self.signal();
    }

    fn unregister(&mut self, id: ConnectionId) -> bool {
        let removed = self.connections.remove(&id).is_some();
        if removed {
            debug!(target: LOG_TARGET, connection_id = %id, "Unregistered");
            self.signal();
        }
        removed
    }

    fn set_interest(&mut self, id: ConnectionId, table_id: Uuid, interested: bool) -> bool {
        let Some(entry) = self.connections.get_mut(&id) else {
            return false;
        };
        let changed = if interested {
            entry.interests.insert(table_id)
        } else {
            entry.interests.remove(&table_id)
        };
        if changed {
            debug!(
                target: LOG_TARGET,
                connection_id = %id,
                %table_id,
                interested,
                "Interest changed"
            );
            self.signal();
        }
        true
    }

    fn desired_tables(&self) -> HashSet<Uuid> {
        self.connections
            .values()
            .flat_map(|e| e.interests.iter().copied())
            .collect()
    }

    fn dispatch(&mut self, table_id: Uuid, payload: Bytes) {
        let mut evicted = Vec::new();
        let mut delivered = 0usize;
        for (id, entry) in &self.connections {
            if !entry.interests.contains(&table_id) {
                continue;
            }
            match entry.handle.deliver_event(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(DeliveryError::Full) => {
                    warn!(target: LOG_TARGET, connection_id = %id, "Evicting slow consumer");
                    entry.handle.close(CloseReason::SlowConsumer);
                    evicted.push(*id);
                }
                Err(DeliveryError::Closed) => evicted.push(*id),
            }
        }
        for id in &evicted {
            self.connections.remove(id);
        }
        if !evicted.is_empty() {
            self.signal();
        }
        debug!(
            target: LOG_TARGET,
            %table_id,
            delivered,
            evicted = evicted.len(),
            "Dispatched event"
        );
    }

    fn shutdown(&mut self) -> usize {
        let count = self.connections.len();
        for entry in self.connections.values() {
            entry.handle.close(CloseReason::Shutdown);
        }
        self.connections.clear();
        self.signal();
        count
    }
}

/// Main loop of the registry actor.
pub async fn run_registry_loop(mut state: RegistryState, mut rx: Receiver<RegistryMessage>) {
    info!(target: LOG_TARGET, "Connection registry started");

    while let Some(msg) = rx.recv().await {
        match msg {
            RegistryMessage::Register {
                handle,
                tables,
                done,
            } => {
                state.register(handle, tables);
                let _ = done.send(());
            }
            RegistryMessage::Unregister { id, done } => {
                let _ = done.send(state.unregister(id));
            }
            RegistryMessage::Subscribe { id, table_id, done } => {
                let _ = done.send(state.set_interest(id, table_id, true));
            }
            RegistryMessage::Unsubscribe { id, table_id, done } => {
                let _ = done.send(state.set_interest(id, table_id, false));
            }
            RegistryMessage::DesiredTables { reply } => {
                let _ = reply.send(state.desired_tables());
            }
            RegistryMessage::Interests { id, reply } => {
                let interests = state.connections.get(&id).map(|e| e.interests.clone());
                let _ = reply.send(interests);
            }
            RegistryMessage::Dispatch { table_id, payload } => {
                state.dispatch(table_id, payload);
            }
            RegistryMessage::Shutdown { done } => {
                let closed = state.shutdown();
                info!(target: LOG_TARGET, closed, "Connection registry shutting down");
                let _ = done.send(closed);
                break;
            }
        }
    }

    info!(target: LOG_TARGET, "Connection registry stopped");
}
