use std::collections::HashMap;

use crate::engine::errors::QueryError;
use crate::engine::query::{FilterNode, QueryRequest, SortSpec};

/// Splits a raw query string into decoded key/value pairs. Later keys
/// overwrite earlier ones.
pub fn parse_query_string(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (percent_decode(key), percent_decode(value))
        })
        .collect()
}

/// Decodes `%XX` escapes and `+` as space. Malformed escapes are kept
/// literally.
pub fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => match (bytes.get(i + 1).and_then(hex), bytes.get(i + 2).and_then(hex)) {
                (Some(hi), Some(lo)) => {
                    out.push(hi << 4 | lo);
                    i += 3;
                }
                _ => {
                    out.push(b'%');
                    i += 1;
                }
            },
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex(b: &u8) -> Option<u8> {
    (*b as char).to_digit(16).map(|d| d as u8)
}

/// Builds a query request from `filter`, `sort`, `page`, `pageSize` and
/// `aggregates` (comma separated) parameters.
pub fn query_request_from_params(
    params: &HashMap<String, String>,
) -> Result<QueryRequest, QueryError> {
    let filter = match params.get("filter") {
        Some(raw) => FilterNode::parse(raw)?,
        None => None,
    };
    let sort = match params.get("sort") {
        Some(raw) => SortSpec::parse_list(raw)?,
        None => Vec::new(),
    };
    let aggregates = params
        .get("aggregates")
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(QueryRequest {
        filter,
        sort,
        page: integer_param(params, "page")?,
        page_size: integer_param(params, "pageSize")?,
        aggregates,
    })
}

fn integer_param(params: &HashMap<String, String>, name: &str) -> Result<Option<i64>, QueryError> {
    match params.get(name).map(|s| s.trim()).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| QueryError::MalformedQuery(format!("{name} must be an integer, got '{raw}'"))),
    }
}
