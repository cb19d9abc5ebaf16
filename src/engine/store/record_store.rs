use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::engine::errors::StoreError;
use crate::engine::query::aggregate::AggregateSpec;
use crate::engine::query::pagination::Page;
use crate::engine::query::predicate::Predicate;
use crate::engine::query::sort::Ordering;
use crate::engine::store::record::Record;

/// Persistence port for records. Query methods consume compiled predicates
/// and orderings; they never see raw client input.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert(&self, record: Record) -> Result<Record, StoreError>;

    async fn get(&self, table_id: Uuid, record_id: Uuid) -> Result<Record, StoreError>;

    /// Shallow-merges `patch` into the stored payload and returns the result.
    async fn update(
        &self,
        table_id: Uuid,
        record_id: Uuid,
        patch: Map<String, Value>,
    ) -> Result<Record, StoreError>;

    /// Removes the record and returns its last stored state.
    async fn delete(&self, table_id: Uuid, record_id: Uuid) -> Result<Record, StoreError>;

    async fn count(&self, table_id: Uuid, predicate: &Predicate) -> Result<u64, StoreError>;

    async fn fetch(
        &self,
        table_id: Uuid,
        predicate: &Predicate,
        ordering: &Ordering,
        page: Option<Page>,
    ) -> Result<Vec<Record>, StoreError>;

    /// One value per spec, in spec order, computed over every record matching
    /// `predicate`. A failure on any spec fails the whole set.
    async fn aggregate(
        &self,
        table_id: Uuid,
        predicate: &Predicate,
        specs: &[AggregateSpec],
    ) -> Result<Vec<Value>, StoreError>;
}
