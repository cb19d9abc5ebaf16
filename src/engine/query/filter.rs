use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::engine::errors::QueryError;

/// Client-supplied filter tree. A node is either a leaf condition or a group
/// of nodes joined by `AND` / `OR`, nested to any depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterNode {
    Condition(FilterCondition),
    Group(FilterGroup),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCondition {
    pub field_id: String,
    pub operator: String,
    /// Raw value; its expected shape depends on the field's declared type.
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterGroup {
    #[serde(default)]
    pub operator: String,
    #[serde(default)]
    pub conditions: Vec<FilterNode>,
}

impl FilterNode {
    /// Parses a filter from its JSON text. Blank input means "no filter".
    pub fn parse(input: &str) -> Result<Option<FilterNode>, QueryError> {
        if input.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(input)
            .map(Some)
            .map_err(|e| QueryError::MalformedQuery(format!("invalid filter JSON format: {e}")))
    }
}

/// Boolean connective of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

impl BoolOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoolOp::And => "AND",
            BoolOp::Or => "OR",
        }
    }
}

impl FromStr for BoolOp {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AND" => Ok(BoolOp::And),
            "OR" => Ok(BoolOp::Or),
            other => Err(QueryError::InvalidBooleanOp(other.to_string())),
        }
    }
}

impl fmt::Display for BoolOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Leaf operators understood by the filter compiler. Which of them are legal
/// depends on the field's declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    IsEmpty,
    IsNotEmpty,
}

impl FilterOperator {
    pub fn parse(s: &str) -> Option<Self> {
        let op = match s.trim() {
            "=" | "==" | "eq" | "equals" => FilterOperator::Equals,
            "!=" | "<>" | "neq" | "not_equals" => FilterOperator::NotEquals,
            ">" | "gt" | "greater_than" => FilterOperator::GreaterThan,
            "<" | "lt" | "less_than" => FilterOperator::LessThan,
            ">=" | "gte" | "greater_or_equal" => FilterOperator::GreaterOrEqual,
            "<=" | "lte" | "less_or_equal" => FilterOperator::LessOrEqual,
            "contains" => FilterOperator::Contains,
            "not_contains" => FilterOperator::NotContains,
            "starts_with" => FilterOperator::StartsWith,
            "ends_with" => FilterOperator::EndsWith,
            "is_empty" => FilterOperator::IsEmpty,
            "is_not_empty" => FilterOperator::IsNotEmpty,
            _ => return None,
        };
        Some(op)
    }
}
