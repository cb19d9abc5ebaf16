use crate::engine::catalog::{FieldDescriptor, MemoryFieldCatalog, NewField, TableCatalog};
use crate::engine::types::FieldType;
use crate::test_helpers::factories::FieldFactory;
use std::collections::HashMap;
use uuid::Uuid;

/// Builds a table catalog whose storage keys equal the field names, and
/// remembers each field id by name so tests can reference fields by name.
pub struct CatalogFactory {
    table_id: Uuid,
    fields: Vec<FieldDescriptor>,
}

impl CatalogFactory {
    pub fn new() -> Self {
        Self {
            table_id: Uuid::new_v4(),
            fields: Vec::new(),
        }
    }

    /// A catalog with one field of every declared type:
    /// `name` (text), `amount` (number), `active` (boolean), `due` (date).
    pub fn standard() -> Self {
        Self::new()
            .with_field("name", FieldType::Text)
            .with_field("amount", FieldType::Number)
            .with_field("active", FieldType::Boolean)
            .with_field("due", FieldType::Date)
    }

    pub fn with_table(mut self, table_id: Uuid) -> Self {
        self.table_id = table_id;
        for f in &mut self.fields {
            f.table_id = table_id;
        }
        self
    }

    pub fn with_field(mut self, name: &str, field_type: FieldType) -> Self {
        let order = self.fields.len() as u32;
        let field = FieldFactory::new()
            .with_name(name)
            .with_type(field_type)
            .with_table(self.table_id)
            .with_order(order)
            .create();
        self.fields.push(field);
        self
    }

    pub fn table_id(&self) -> Uuid {
        self.table_id
    }

    pub fn ids(&self) -> HashMap<String, String> {
        self.fields
            .iter()
            .map(|f| (f.name.clone(), f.id.to_string()))
            .collect()
    }

    pub fn fields(&self) -> Vec<FieldDescriptor> {
        self.fields.clone()
    }

    pub fn create(&self) -> TableCatalog {
        TableCatalog::new(self.table_id, self.fields.clone())
    }

    /// Defines the fields on `catalog` under this factory's table and
    /// returns the assigned field ids by name.
    pub fn define_in(&self, catalog: &MemoryFieldCatalog) -> HashMap<String, String> {
        self.fields
            .iter()
            .map(|f| {
                let defined = catalog
                    .define_field(
                        self.table_id,
                        NewField {
                            name: f.name.clone(),
                            field_type: f.field_type.as_str().to_string(),
                            storage_key: Some(f.storage_key.clone()),
                        },
                    )
                    .expect("field defines");
                (defined.name, defined.id.to_string())
            })
            .collect()
    }
}
