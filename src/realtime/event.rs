use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::store::Record;
use crate::realtime::errors::RealtimeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    #[serde(rename = "record_created")]
    Created,
    #[serde(rename = "record_updated")]
    Updated,
    #[serde(rename = "record_deleted")]
    Deleted,
}

/// A record mutation as seen by realtime clients. `record` is present for
/// creations and updates only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub table_id: Uuid,
    pub record_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<Record>,
}

impl ChangeEvent {
    pub fn created(record: Record) -> Self {
        Self {
            kind: ChangeKind::Created,
            table_id: record.table_id,
            record_id: record.id,
            record: Some(record),
        }
    }

    pub fn updated(record: Record) -> Self {
        Self {
            kind: ChangeKind::Updated,
            table_id: record.table_id,
            record_id: record.id,
            record: Some(record),
        }
    }

    pub fn deleted(table_id: Uuid, record_id: Uuid) -> Self {
        Self {
            kind: ChangeKind::Deleted,
            table_id,
            record_id,
            record: None,
        }
    }

    /// Serializes the event once; the bytes are shared by every recipient.
    pub fn encode(&self) -> Result<Bytes, RealtimeError> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }
}
