use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

use crate::engine::catalog::field::FieldDescriptor;
use crate::engine::errors::StoreError;

/// Source of field metadata for a table. Implemented by the schema
/// subsystem; the query core only reads from it.
#[async_trait]
pub trait FieldCatalog: Send + Sync {
    async fn table_catalog(&self, table_id: Uuid) -> Result<TableCatalog, StoreError>;
}

/// Snapshot of one table's fields, resolved once per query.
#[derive(Debug, Clone, Default)]
pub struct TableCatalog {
    table_id: Uuid,
    fields: HashMap<Uuid, FieldDescriptor>,
}

impl TableCatalog {
    pub fn new(table_id: Uuid, fields: impl IntoIterator<Item = FieldDescriptor>) -> Self {
        Self {
            table_id,
            fields: fields.into_iter().map(|f| (f.id, f)).collect(),
        }
    }

    pub fn table_id(&self) -> Uuid {
        self.table_id
    }

    /// Looks a field up by its identifier as sent by clients.
    pub fn resolve(&self, field_id: &str) -> Option<&FieldDescriptor> {
        Uuid::parse_str(field_id.trim())
            .ok()
            .and_then(|id| self.fields.get(&id))
    }

    /// Fields sorted by display order.
    pub fn ordered(&self) -> Vec<&FieldDescriptor> {
        let mut fields: Vec<&FieldDescriptor> = self.fields.values().collect();
        fields.sort_by_key(|f| (f.order, f.id));
        fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
