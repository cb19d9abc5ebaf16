use crate::engine::catalog::FieldDescriptor;
use crate::engine::types::FieldType;
use uuid::Uuid;

pub struct FieldFactory {
    descriptor: FieldDescriptor,
}

impl FieldFactory {
    pub fn new() -> Self {
        Self {
            descriptor: FieldDescriptor {
                id: Uuid::new_v4(),
                table_id: Uuid::nil(),
                name: "title".to_string(),
                storage_key: "title".to_string(),
                field_type: FieldType::Text,
                order: 0,
            },
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.descriptor.name = name.to_string();
        self.descriptor.storage_key = name.to_string();
        self
    }

    pub fn with_storage_key(mut self, key: &str) -> Self {
        self.descriptor.storage_key = key.to_string();
        self
    }

    pub fn with_type(mut self, field_type: FieldType) -> Self {
        self.descriptor.field_type = field_type;
        self
    }

    pub fn with_table(mut self, table_id: Uuid) -> Self {
        self.descriptor.table_id = table_id;
        self
    }

    pub fn with_order(mut self, order: u32) -> Self {
        self.descriptor.order = order;
        self
    }

    pub fn create(self) -> FieldDescriptor {
        self.descriptor
    }
}
