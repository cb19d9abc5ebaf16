use crate::engine::store::Record;
use serde_json::{Map, Value};
use uuid::Uuid;

pub struct RecordFactory {
    table_id: Uuid,
    data: Map<String, Value>,
}

impl RecordFactory {
    pub fn new(table_id: Uuid) -> Self {
        Self {
            table_id,
            data: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.data.insert(key.to_string(), value);
        self
    }

    pub fn data(self) -> Map<String, Value> {
        self.data
    }

    pub fn create(self) -> Record {
        Record::new(self.table_id, self.data)
    }
}
