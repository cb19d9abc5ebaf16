use std::fmt;
use std::str::FromStr;

use crate::engine::catalog::TableCatalog;
use crate::engine::errors::QueryError;
use crate::engine::query::predicate::Accessor;
use crate::engine::types::Cast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "count",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Avg => "avg",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
        }
    }
}

impl FromStr for AggregateFunction {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "count" => Ok(AggregateFunction::Count),
            "sum" => Ok(AggregateFunction::Sum),
            "avg" => Ok(AggregateFunction::Avg),
            "min" => Ok(AggregateFunction::Min),
            "max" => Ok(AggregateFunction::Max),
            other => Err(QueryError::InvalidAggregate(format!(
                "unsupported aggregate function: {other}"
            ))),
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved aggregate. `label` is the request string and becomes the key
/// in the result's `aggregates` map.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateSpec {
    pub label: String,
    pub function: AggregateFunction,
    pub accessor: Accessor,
}

/// Resolves `"<fn>:<fieldId>"` requests against the catalog. `count` counts
/// non-null values; every other function casts values to numeric.
pub fn compile_aggregates(
    catalog: &TableCatalog,
    requests: &[String],
) -> Result<Vec<AggregateSpec>, QueryError> {
    requests
        .iter()
        .map(|request| {
            let (function, field_id) = request.split_once(':').ok_or_else(|| {
                QueryError::InvalidAggregate(format!("invalid aggregate format: {request}"))
            })?;
            let function: AggregateFunction = function.parse()?;
            let field = catalog
                .resolve(field_id)
                .ok_or_else(|| QueryError::UnknownField {
                    field_id: field_id.to_string(),
                })?;
            let cast = match function {
                AggregateFunction::Count => Cast::None,
                _ => Cast::Numeric,
            };
            Ok(AggregateSpec {
                label: request.clone(),
                function,
                accessor: Accessor::new(field.storage_key.clone(), cast),
            })
        })
        .collect()
}
