use async_trait::async_trait;
use parking_lot::RwLock;
use rand::{Rng, distributions::Alphanumeric};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use crate::engine::catalog::table::{FieldCatalog, TableCatalog};
use crate::engine::catalog::field::{FieldDescriptor, NewField};
use crate::engine::errors::{CatalogError, StoreError};
use crate::engine::types::FieldType;

const STORAGE_KEY_LEN: usize = 8;

/// Process-local field catalog.
#[derive(Debug, Default)]
pub struct MemoryFieldCatalog {
    tables: RwLock<HashMap<Uuid, Vec<FieldDescriptor>>>,
}

impl MemoryFieldCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines a field. The storage key defaults to a short random key and
    /// display order is assigned after the table's last field.
    pub fn define_field(
        &self,
        table_id: Uuid,
        new_field: NewField,
    ) -> Result<FieldDescriptor, CatalogError> {
        let name = new_field.name.trim().to_string();
        if name.is_empty() {
            return Err(CatalogError::EmptyName);
        }
        let field_type = new_field
            .field_type
            .parse::<FieldType>()
            .map_err(|_| CatalogError::UnsupportedFieldType(new_field.field_type.clone()))?;

        let mut tables = self.tables.write();
        let fields = tables.entry(table_id).or_default();

        let storage_key = match new_field.storage_key {
            Some(key) if !key.trim().is_empty() => {
                let key = key.trim().to_string();
                if fields.iter().any(|f| f.storage_key == key) {
                    return Err(CatalogError::DuplicateStorageKey(key));
                }
                key
            }
            _ => loop {
                let candidate: String = rand::thread_rng()
                    .sample_iter(&Alphanumeric)
                    .take(STORAGE_KEY_LEN)
                    .map(char::from)
                    .collect();
                if !fields.iter().any(|f| f.storage_key == candidate) {
                    break candidate;
                }
            },
        };

        let order = fields.iter().map(|f| f.order + 1).max().unwrap_or(0);
        let descriptor = FieldDescriptor {
            id: Uuid::new_v4(),
            table_id,
            name,
            storage_key,
            field_type,
            order,
        };
        fields.push(descriptor.clone());

        info!(
            target: "engine::catalog",
            %table_id,
            field_id = %descriptor.id,
            storage_key = %descriptor.storage_key,
            field_type = %descriptor.field_type,
            "Field defined"
        );
        Ok(descriptor)
    }

    /// Fields of a table in display order.
    pub fn fields(&self, table_id: Uuid) -> Vec<FieldDescriptor> {
        let mut fields = self
            .tables
            .read()
            .get(&table_id)
            .cloned()
            .unwrap_or_default();
        fields.sort_by_key(|f| f.order);
        fields
    }
}

#[async_trait]
impl FieldCatalog for MemoryFieldCatalog {
    async fn table_catalog(&self, table_id: Uuid) -> Result<TableCatalog, StoreError> {
        Ok(TableCatalog::new(table_id, self.fields(table_id)))
    }
}
