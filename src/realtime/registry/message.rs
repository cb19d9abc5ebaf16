use bytes::Bytes;
use std::collections::HashSet;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::realtime::connection::{ConnectionHandle, ConnectionId};

/// Requests processed one at a time by the registry actor. Mutations
/// acknowledge once applied, so a caller knows later dispatches see them.
#[derive(Debug)]
pub enum RegistryMessage {
    Register {
        handle: ConnectionHandle,
        tables: HashSet<Uuid>,
        done: oneshot::Sender<()>,
    },
    Unregister {
        id: ConnectionId,
        done: oneshot::Sender<bool>,
    },
    Subscribe {
        id: ConnectionId,
        table_id: Uuid,
        done: oneshot::Sender<bool>,
    },
    Unsubscribe {
        id: ConnectionId,
        table_id: Uuid,
        done: oneshot::Sender<bool>,
    },
    /// Union of every live connection's interest set.
    DesiredTables {
        reply: oneshot::Sender<HashSet<Uuid>>,
    },
    Interests {
        id: ConnectionId,
        reply: oneshot::Sender<Option<HashSet<Uuid>>>,
    },
    /// Fan an encoded event out to every connection interested in the table.
    Dispatch { table_id: Uuid, payload: Bytes },
    /// Closes every connection and stops the actor.
    Shutdown { done: oneshot::Sender<usize> },
}
