use bytes::Bytes;
use std::collections::HashSet;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::realtime::connection::{ConnectionHandle, ConnectionId};
use crate::realtime::errors::RealtimeError;
use crate::realtime::registry::actor::{RegistryState, run_registry_loop};
use crate::realtime::registry::message::RegistryMessage;

const MAILBOX_CAPACITY: usize = 1024;

/// Cloneable front for the registry actor.
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    tx: mpsc::Sender<RegistryMessage>,
}

impl RegistryHandle {
    /// Spawns the actor. Every mutation emits a coalesced signal on
    /// `reconcile`.
    pub fn spawn(reconcile: mpsc::Sender<()>) -> Self {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        tokio::spawn(run_registry_loop(RegistryState::new(reconcile), rx));
        Self { tx }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RegistryMessage,
    ) -> Result<T, RealtimeError> {
        let (done, rx) = oneshot::channel();
        self.tx
            .send(build(done))
            .await
            .map_err(|_| RealtimeError::RegistryClosed)?;
        rx.await.map_err(|_| RealtimeError::RegistryClosed)
    }

    pub async fn register(
        &self,
        handle: ConnectionHandle,
        tables: HashSet<Uuid>,
    ) -> Result<(), RealtimeError> {
        self.request(|done| RegistryMessage::Register {
            handle,
            tables,
            done,
        })
        .await
    }

    /// Returns whether the connection was still registered.
    pub async fn unregister(&self, id: ConnectionId) -> Result<bool, RealtimeError> {
        self.request(|done| RegistryMessage::Unregister { id, done })
            .await
    }

    /// Returns false when the connection is unknown.
    pub async fn subscribe(&self, id: ConnectionId, table_id: Uuid) -> Result<bool, RealtimeError> {
        self.request(|done| RegistryMessage::Subscribe { id, table_id, done })
            .await
    }

    pub async fn unsubscribe(
        &self,
        id: ConnectionId,
        table_id: Uuid,
    ) -> Result<bool, RealtimeError> {
        self.request(|done| RegistryMessage::Unsubscribe { id, table_id, done })
            .await
    }

    pub async fn desired_tables(&self) -> Result<HashSet<Uuid>, RealtimeError> {
        self.request(|reply| RegistryMessage::DesiredTables { reply })
            .await
    }

    pub async fn interests(&self, id: ConnectionId) -> Result<Option<HashSet<Uuid>>, RealtimeError> {
        self.request(|reply| RegistryMessage::Interests { id, reply })
            .await
    }

    pub async fn dispatch(&self, table_id: Uuid, payload: Bytes) -> Result<(), RealtimeError> {
        self.tx
            .send(RegistryMessage::Dispatch { table_id, payload })
            .await
            .map_err(|_| RealtimeError::RegistryClosed)
    }

    /// Closes every connection and stops the actor. Returns how many
    /// connections were closed.
    pub async fn shutdown(&self) -> Result<usize, RealtimeError> {
        self.request(|done| RegistryMessage::Shutdown { done })
            .await
    }
}
