use http_body_util::BodyExt;
use hyper::body::Body;
use hyper::{Method, Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt::Display;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::engine::catalog::NewField;
use crate::engine::query::QueryRequest;
use crate::frontend::context::FrontendContext;
use crate::frontend::http::query_params::{parse_query_string, query_request_from_params};
use crate::frontend::http::response::{
    catalog_error, empty, error_body, json_response, query_error, record_error,
};
use crate::frontend::http::router::{Route, RouteError};

const LOG_TARGET: &str = "frontend::http";

struct HttpHandler {
    ctx: Arc<FrontendContext>,
}

impl HttpHandler {
    fn new(ctx: Arc<FrontendContext>) -> Self {
        Self { ctx }
    }

    async fn handle<B>(&self, req: Request<B>) -> Response<String>
    where
        B: Body,
        B::Error: Display,
    {
        if self.ctx.server_state.is_shutting_down() {
            return error_body(StatusCode::SERVICE_UNAVAILABLE, "server is shutting down");
        }

        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let params = parse_query_string(req.uri().query().unwrap_or(""));
        debug!(target: LOG_TARGET, %method, %path, "Request");

        let route = match Route::parse(&path) {
            Ok(route) => route,
            Err(RouteError::NotFound) => {
                return error_body(StatusCode::NOT_FOUND, "not found");
            }
            Err(RouteError::InvalidId(id)) => {
                return error_body(StatusCode::BAD_REQUEST, &format!("invalid id: {id}"));
            }
        };

        match (route, method) {
            (Route::Health, Method::GET) => json_response(StatusCode::OK, &json!({ "status": "ok" })),
            (Route::Fields(table_id), Method::GET) => {
                json_response(StatusCode::OK, &self.ctx.catalog.fields(table_id))
            }
            (Route::Fields(table_id), Method::POST) => {
                let new_field: NewField = match read_json(req).await {
                    Ok(v) => v,
                    Err(resp) => return resp,
                };
                match self.ctx.catalog.define_field(table_id, new_field) {
                    Ok(field) => json_response(StatusCode::CREATED, &field),
                    Err(e) => catalog_error(&e),
                }
            }
            (Route::Records(table_id), Method::GET) => self.list(table_id, &params).await,
            (Route::Records(table_id), Method::POST) => {
                let payload: Value = match read_json(req).await {
                    Ok(v) => v,
                    Err(resp) => return resp,
                };
                match self.ctx.records.create(table_id, payload).await {
                    Ok(record) => json_response(StatusCode::CREATED, &record),
                    Err(e) => record_error(&e),
                }
            }
            (Route::RecordQuery(table_id), Method::POST) => {
                let request: QueryRequest = match read_json(req).await {
                    Ok(v) => v,
                    Err(resp) => return resp,
                };
                self.query(table_id, &request).await
            }
            (Route::Record(table_id, record_id), Method::GET) => {
                match self.ctx.records.get(table_id, record_id).await {
                    Ok(record) => json_response(StatusCode::OK, &record),
                    Err(e) => record_error(&e),
                }
            }
            (Route::Record(table_id, record_id), Method::PUT) => {
                let patch: Value = match read_json(req).await {
                    Ok(v) => v,
                    Err(resp) => return resp,
                };
                match self.ctx.records.update(table_id, record_id, patch).await {
                    Ok(record) => json_response(StatusCode::OK, &record),
                    Err(e) => record_error(&e),
                }
            }
            (Route::Record(table_id, record_id), Method::DELETE) => {
                match self.ctx.records.delete(table_id, record_id).await {
                    Ok(()) => empty(StatusCode::NO_CONTENT),
                    Err(e) => record_error(&e),
                }
            }
            _ => error_body(StatusCode::METHOD_NOT_ALLOWED, "method not allowed"),
        }
    }

    async fn list(&self, table_id: Uuid, params: &HashMap<String, String>) -> Response<String> {
        match query_request_from_params(params) {
            Ok(request) => self.query(table_id, &request).await,
            Err(e) => query_error(&e),
        }
    }

    async fn query(&self, table_id: Uuid, request: &QueryRequest) -> Response<String> {
        match self.ctx.records.list(table_id, request).await {
            Ok(result) => json_response(StatusCode::OK, &result),
            Err(e) => query_error(&e),
        }
    }
}

async fn read_json<B, T>(req: Request<B>) -> Result<T, Response<String>>
where
    B: Body,
    B::Error: Display,
    T: DeserializeOwned,
{
    let body = req.into_body().collect().await.map_err(|e| {
        error_body(StatusCode::BAD_REQUEST, &format!("failed to read body: {e}"))
    })?;
    serde_json::from_slice(&body.to_bytes())
        .map_err(|e| error_body(StatusCode::BAD_REQUEST, &format!("invalid JSON body: {e}")))
}

pub async fn handle_request<B>(
    req: Request<B>,
    ctx: Arc<FrontendContext>,
) -> Result<Response<String>, Infallible>
where
    B: Body,
    B::Error: Display,
{
    let handler = HttpHandler::new(ctx);
    Ok(handler.handle(req).await)
}
