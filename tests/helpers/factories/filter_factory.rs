use crate::engine::query::filter::{FilterCondition, FilterGroup, FilterNode};
use serde_json::Value;

pub struct FilterFactory;

impl FilterFactory {
    pub fn condition(field_id: &str, operator: &str, value: Value) -> FilterNode {
        FilterNode::Condition(FilterCondition {
            field_id: field_id.to_string(),
            operator: operator.to_string(),
            value,
        })
    }

    pub fn and(children: Vec<FilterNode>) -> FilterNode {
        Self::group("AND", children)
    }

    pub fn or(children: Vec<FilterNode>) -> FilterNode {
        Self::group("OR", children)
    }

    pub fn group(operator: &str, children: Vec<FilterNode>) -> FilterNode {
        FilterNode::Group(FilterGroup {
            operator: operator.to_string(),
            conditions: children,
        })
    }
}
