use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

use crate::engine::errors::QueryError;
use crate::engine::query::predicate::Accessor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }

    /// Ascending puts missing values last, descending puts them first.
    pub fn nulls(&self) -> NullsOrder {
        match self {
            SortDirection::Ascending => NullsOrder::Last,
            SortDirection::Descending => NullsOrder::First,
        }
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Ascending),
            "desc" | "descending" => Ok(SortDirection::Descending),
            other => Err(format!("invalid sort direction: {other}")),
        }
    }
}

impl Serialize for SortDirection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(match self {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        })
    }
}

impl<'de> Deserialize<'de> for SortDirection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortSpec {
    pub field_id: String,
    pub direction: SortDirection,
}

impl SortSpec {
    /// Parses a JSON sort list. Blank input means "no explicit ordering".
    pub fn parse_list(input: &str) -> Result<Vec<SortSpec>, QueryError> {
        if input.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(input)
            .map_err(|e| QueryError::MalformedQuery(format!("invalid sort JSON format: {e}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsOrder {
    First,
    Last,
}

impl NullsOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            NullsOrder::First => "NULLS FIRST",
            NullsOrder::Last => "NULLS LAST",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderKey {
    pub accessor: Accessor,
    pub direction: SortDirection,
    pub nulls: NullsOrder,
}

/// Composite ordering; the first key is the primary key. Empty means the
/// store's default order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ordering {
    keys: Vec<OrderKey>,
}

impl Ordering {
    pub fn new(keys: Vec<OrderKey>) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &[OrderKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Renders an `ORDER BY` list, e.g.
    /// `(data ->> 'k')::numeric DESC NULLS FIRST, data ->> 'n' ASC NULLS LAST`.
    pub fn to_sql(&self) -> Option<String> {
        if self.keys.is_empty() {
            return None;
        }
        let parts: Vec<String> = self
            .keys
            .iter()
            .map(|k| {
                format!(
                    "{} {} {}",
                    k.accessor.typed_sql(),
                    k.direction.as_sql(),
                    k.nulls.as_sql()
                )
            })
            .collect();
        Some(parts.join(", "))
    }
}
