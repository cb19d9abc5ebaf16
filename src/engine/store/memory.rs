use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use crate::engine::errors::StoreError;
use crate::engine::query::aggregate::AggregateSpec;
use crate::engine::query::pagination::Page;
use crate::engine::query::predicate::Predicate;
use crate::engine::query::sort::Ordering;
use crate::engine::store::evaluator::{aggregate, compare_payloads, matches};
use crate::engine::store::record::Record;
use crate::engine::store::record_store::RecordStore;

const LOG_TARGET: &str = "engine::store::memory";

/// Process-local record store. Records are kept per table in insertion
/// order, which is also the default order when no ordering is given.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    tables: RwLock<HashMap<Uuid, Vec<Record>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn matching(&self, table_id: Uuid, predicate: &Predicate) -> Vec<Record> {
        self.tables
            .read()
            .get(&table_id)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| matches(predicate, &r.data))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert(&self, record: Record) -> Result<Record, StoreError> {
        let mut tables = self.tables.write();
        tables.entry(record.table_id).or_default().push(record.clone());
        debug!(target: LOG_TARGET, table_id = %record.table_id, record_id = %record.id, "Inserted record");
        Ok(record)
    }

    async fn get(&self, table_id: Uuid, record_id: Uuid) -> Result<Record, StoreError> {
        self.tables
            .read()
            .get(&table_id)
            .and_then(|records| records.iter().find(|r| r.id == record_id))
            .cloned()
            .ok_or(StoreError::RecordNotFound(record_id))
    }

    async fn update(
        &self,
        table_id: Uuid,
        record_id: Uuid,
        patch: Map<String, Value>,
    ) -> Result<Record, StoreError> {
        let mut tables = self.tables.write();
        let record = tables
            .get_mut(&table_id)
            .and_then(|records| records.iter_mut().find(|r| r.id == record_id))
            .ok_or(StoreError::RecordNotFound(record_id))?;
        record.merge(patch);
        Ok(record.clone())
    }

    async fn delete(&self, table_id: Uuid, record_id: Uuid) -> Result<Record, StoreError> {
        let mut tables = self.tables.write();
        let records = tables
            .get_mut(&table_id)
            .ok_or(StoreError::RecordNotFound(record_id))?;
        let pos = records
            .iter()
            .position(|r| r.id == record_id)
            .ok_or(StoreError::RecordNotFound(record_id))?;
        Ok(records.remove(pos))
    }

    async fn count(&self, table_id: Uuid, predicate: &Predicate) -> Result<u64, StoreError> {
        let tables = self.tables.read();
        let count = tables
            .get(&table_id)
            .map(|records| records.iter().filter(|r| matches(predicate, &r.data)).count())
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn fetch(
        &self,
        table_id: Uuid,
        predicate: &Predicate,
        ordering: &Ordering,
        page: Option<Page>,
    ) -> Result<Vec<Record>, StoreError> {
        let mut records = self.matching(table_id, predicate);
        if !ordering.is_empty() {
            // Stable: ties keep insertion order.
            records.sort_by(|a, b| compare_payloads(ordering, &a.data, &b.data));
        }
        Ok(match page {
            Some(page) => records.into_iter().skip(page.offset).take(page.limit).collect(),
            None => records,
        })
    }

    async fn aggregate(
        &self,
        table_id: Uuid,
        predicate: &Predicate,
        specs: &[AggregateSpec],
    ) -> Result<Vec<Value>, StoreError> {
        let records = self.matching(table_id, predicate);
        specs
            .iter()
            .map(|spec| aggregate(spec, records.iter().map(|r| &r.data)))
            .collect()
    }
}
