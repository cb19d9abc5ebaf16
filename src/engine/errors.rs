use thiserror::Error;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::engine::types::FieldType;

/// Errors raised while compiling or executing a record query.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("field with ID {field_id} not found")]
    UnknownField { field_id: String },

    #[error("unsupported operator for {field_type} field {field}: {operator}")]
    UnsupportedOperator {
        field: String,
        field_type: FieldType,
        operator: String,
    },

    #[error("invalid value format for {field_type} field {field}: {reason}")]
    InvalidValueFormat {
        field: String,
        field_type: FieldType,
        reason: String,
    },

    #[error("invalid filter operator: {0}")]
    InvalidBooleanOp(String),

    #[error("invalid aggregate: {0}")]
    InvalidAggregate(String),

    #[error("malformed query: {0}")]
    MalformedQuery(String),

    #[error("record store failure: {0}")]
    RecordStoreFailure(#[from] StoreError),
}

impl QueryError {
    /// Client-input errors map to 400; everything else is a server error.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, QueryError::RecordStoreFailure(_))
    }

    pub fn log_error(&self) {
        match self {
            QueryError::RecordStoreFailure(e) => {
                error!("Record store failure: {}", e);
                debug!("Record store failure details: {:?}", e);
            }
            other => {
                warn!("Rejected query: {}", other);
                debug!("Rejected query details: {:?}", other);
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    RecordNotFound(Uuid),

    #[error("cannot cast value of '{key}' to {target}: {value}")]
    Cast {
        key: String,
        target: &'static str,
        value: String,
    },
}

#[derive(Debug, Error)]
pub enum RecordServiceError {
    #[error("record not found: {0}")]
    NotFound(Uuid),

    #[error("invalid record payload: {0}")]
    InvalidPayload(String),

    #[error("record store failure: {0}")]
    Store(StoreError),
}

impl From<StoreError> for RecordServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::RecordNotFound(id) => RecordServiceError::NotFound(id),
            other => RecordServiceError::Store(other),
        }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("storage key '{0}' already used in table")]
    DuplicateStorageKey(String),

    #[error("unsupported field type: {0}")]
    UnsupportedFieldType(String),

    #[error("field name must not be empty")]
    EmptyName,
}
