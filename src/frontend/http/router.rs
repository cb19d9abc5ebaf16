use uuid::Uuid;

const API_PREFIX: &str = "/api/v1/tables/";

/// Resources exposed by the HTTP API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Health,
    /// `/api/v1/tables/{tableId}/fields`
    Fields(Uuid),
    /// `/api/v1/tables/{tableId}/records`
    Records(Uuid),
    /// `/api/v1/tables/{tableId}/records/query`
    RecordQuery(Uuid),
    /// `/api/v1/tables/{tableId}/records/{recordId}`
    Record(Uuid, Uuid),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    NotFound,
    InvalidId(String),
}

impl Route {
    pub fn parse(path: &str) -> Result<Route, RouteError> {
        let path = path.trim_end_matches('/');
        if path == "/health" {
            return Ok(Route::Health);
        }

        let rest = path.strip_prefix(API_PREFIX).ok_or(RouteError::NotFound)?;
        let segments: Vec<&str> = rest.split('/').collect();
        match segments.as_slice() {
            [table, "fields"] => Ok(Route::Fields(parse_id(table)?)),
            [table, "records"] => Ok(Route::Records(parse_id(table)?)),
            [table, "records", "query"] => Ok(Route::RecordQuery(parse_id(table)?)),
            [table, "records", record] => Ok(Route::Record(parse_id(table)?, parse_id(record)?)),
            _ => Err(RouteError::NotFound),
        }
    }
}

fn parse_id(segment: &str) -> Result<Uuid, RouteError> {
    Uuid::parse_str(segment).map_err(|_| RouteError::InvalidId(segment.to_string()))
}
