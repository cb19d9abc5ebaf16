use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::{Response, StatusCode};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use crate::engine::errors::{CatalogError, QueryError, RecordServiceError};

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<String> {
    match serde_json::to_string(body) {
        Ok(body) => with_status(status, body, "application/json"),
        Err(e) => {
            error!(target: "frontend::http", error = %e, "Failed to serialize response");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "failed to serialize response")
        }
    }
}

/// `{"error": message}` with the given status.
pub fn error_body(status: StatusCode, message: &str) -> Response<String> {
    with_status(status, json!({ "error": message }).to_string(), "application/json")
}

pub fn empty(status: StatusCode) -> Response<String> {
    let mut response = Response::new(String::new());
    *response.status_mut() = status;
    response
}

fn with_status(status: StatusCode, body: String, content_type: &'static str) -> Response<String> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

pub fn query_error(e: &QueryError) -> Response<String> {
    e.log_error();
    let status = if e.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    error_body(status, &e.to_string())
}

pub fn record_error(e: &RecordServiceError) -> Response<String> {
    let status = match e {
        RecordServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        RecordServiceError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
        RecordServiceError::Store(inner) => {
            error!(target: "frontend::http", error = %inner, "Record store failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_body(status, &e.to_string())
}

pub fn catalog_error(e: &CatalogError) -> Response<String> {
    error_body(StatusCode::BAD_REQUEST, &e.to_string())
}
