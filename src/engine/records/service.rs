use dashmap::DashMap;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::errors::{QueryError, RecordServiceError};
use crate::engine::query::{QueryExecutor, QueryRequest, QueryResult};
use crate::engine::store::{Record, RecordStore};
use crate::realtime::{ChangeEvent, ChangePublisher};

const LOG_TARGET: &str = "engine::records";

/// Record mutations and queries. Each mutation is persisted first and then
/// published; mutations of one table are serialized so events leave in
/// persist order.
pub struct RecordService {
    store: Arc<dyn RecordStore>,
    executor: QueryExecutor,
    publisher: Option<ChangePublisher>,
    table_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl RecordService {
    pub fn new(store: Arc<dyn RecordStore>, executor: QueryExecutor) -> Self {
        Self {
            store,
            executor,
            publisher: None,
            table_locks: DashMap::new(),
        }
    }

    pub fn with_publisher(mut self, publisher: ChangePublisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    async fn lock_table(&self, table_id: Uuid) -> TableGuard<'_> {
        let lock = self
            .table_locks
            .entry(table_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        TableGuard {
            locks: &self.table_locks,
            table_id,
            guard: Some(lock.lock_owned().await),
        }
    }

    #[cfg(test)]
    pub(crate) fn tracked_table_locks(&self) -> usize {
        self.table_locks.len()
    }

    /// Broker failures never fail the mutation: the change is already durable.
    async fn publish(&self, event: ChangeEvent) {
        let Some(publisher) = &self.publisher else {
            return;
        };
        if let Err(e) = publisher.publish(&event).await {
            warn!(
                target: LOG_TARGET,
                table_id = %event.table_id,
                record_id = %event.record_id,
                error = %e,
                "Change notification dropped"
            );
        }
    }

    pub async fn create(&self, table_id: Uuid, payload: Value) -> Result<Record, RecordServiceError> {
        let data = into_object(payload)?;
        let _guard = self.lock_table(table_id).await;
        let record = self.store.insert(Record::new(table_id, data)).await?;
        info!(target: LOG_TARGET, %table_id, record_id = %record.id, "Record created");
        self.publish(ChangeEvent::created(record.clone())).await;
        Ok(record)
    }

    pub async fn get(&self, table_id: Uuid, record_id: Uuid) -> Result<Record, RecordServiceError> {
        Ok(self.store.get(table_id, record_id).await?)
    }

    /// Shallow-merges `patch` into the stored payload. Keys that match no
    /// field are kept as sent.
    pub async fn update(
        &self,
        table_id: Uuid,
        record_id: Uuid,
        patch: Value,
    ) -> Result<Record, RecordServiceError> {
        let patch = into_object(patch)?;
        let _guard = self.lock_table(table_id).await;
        let record = self.store.update(table_id, record_id, patch).await?;
        info!(target: LOG_TARGET, %table_id, %record_id, "Record updated");
        self.publish(ChangeEvent::updated(record.clone())).await;
        Ok(record)
    }

    pub async fn delete(&self, table_id: Uuid, record_id: Uuid) -> Result<(), RecordServiceError> {
        let _guard = self.lock_table(table_id).await;
        self.store.delete(table_id, record_id).await?;
        info!(target: LOG_TARGET, %table_id, %record_id, "Record deleted");
        self.publish(ChangeEvent::deleted(table_id, record_id)).await;
        Ok(())
    }

    pub async fn list(
        &self,
        table_id: Uuid,
        request: &QueryRequest,
    ) -> Result<QueryResult, QueryError> {
        self.executor.execute(table_id, request).await
    }
}

/// Holds a table's write lock. The map entry is dropped with the last
/// holder, so idle tables keep no lock around.
struct TableGuard<'a> {
    locks: &'a DashMap<Uuid, Arc<Mutex<()>>>,
    table_id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for TableGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters hold a clone, so a count of one means only the map is left.
        self.locks
            .remove_if(&self.table_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

fn into_object(payload: Value) -> Result<Map<String, Value>, RecordServiceError> {
    match payload {
        Value::Object(map) => Ok(map),
        other => Err(RecordServiceError::InvalidPayload(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
