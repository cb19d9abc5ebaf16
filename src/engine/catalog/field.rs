use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::types::FieldType;

/// Read-only field metadata as resolved by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub id: Uuid,
    pub table_id: Uuid,
    pub name: String,
    /// Key under which the value lives in the record payload. Unique per table.
    pub storage_key: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub order: u32,
}

/// Request to define a field on a table.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub storage_key: Option<String>,
}
