//! Naive reference evaluation of filter trees straight from their JSON
//! form, used to cross-check compiled predicates.

use crate::engine::catalog::TableCatalog;
use crate::engine::query::filter::{FilterCondition, FilterNode};
use crate::engine::types::{FieldType, parse_bool, parse_timestamp, text_of};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Whether `data` satisfies `node`. A tree without any condition matches.
pub fn oracle_matches(catalog: &TableCatalog, node: &FilterNode, data: &Map<String, Value>) -> bool {
    match eval(catalog, node, data) {
        None => true,
        Some(result) => result == Some(true),
    }
}

/// Outer `None`: node contributes nothing. Inner `None`: SQL unknown.
fn eval(catalog: &TableCatalog, node: &FilterNode, data: &Map<String, Value>) -> Option<Option<bool>> {
    match node {
        FilterNode::Condition(c) => Some(condition(catalog, c, data)),
        FilterNode::Group(g) => {
            let results: Vec<Option<bool>> = g
                .conditions
                .iter()
                .filter_map(|child| eval(catalog, child, data))
                .collect();
            if results.is_empty() {
                return None;
            }
            let and = g.operator == "AND";
            if and {
                if results.contains(&Some(false)) {
                    Some(Some(false))
                } else if results.contains(&None) {
                    Some(None)
                } else {
                    Some(Some(true))
                }
            } else if results.contains(&Some(true)) {
                Some(Some(true))
            } else if results.contains(&None) {
                Some(None)
            } else {
                Some(Some(false))
            }
        }
    }
}

fn condition(catalog: &TableCatalog, c: &FilterCondition, data: &Map<String, Value>) -> Option<bool> {
    let field = catalog.resolve(&c.field_id).expect("oracle needs a known field");
    let raw = data.get(&field.storage_key);
    let text = raw.and_then(text_of);

    match c.operator.as_str() {
        "is_empty" => {
            return Some(match &text {
                None => true,
                Some(t) => field.field_type == FieldType::Text && t.is_empty(),
            });
        }
        "is_not_empty" => {
            return Some(match &text {
                None => false,
                Some(t) => !(field.field_type == FieldType::Text && t.is_empty()),
            });
        }
        _ => {}
    }

    let text = text?;
    if field.field_type == FieldType::Text {
        let needle = c.value.as_str().expect("text needle");
        return Some(match c.operator.as_str() {
            "contains" => text.contains(needle),
            "not_contains" => !text.contains(needle),
            "starts_with" => text.starts_with(needle),
            "ends_with" => text.ends_with(needle),
            "=" => text == needle,
            "!=" => text != needle,
            other => panic!("oracle: unexpected text operator {other}"),
        });
    }

    let ord = match field.field_type {
        FieldType::Number => {
            let left = match raw {
                Some(Value::Number(n)) => n.as_f64(),
                _ => text.trim().parse::<f64>().ok(),
            }?;
            left.partial_cmp(&c.value.as_f64().expect("number operand"))?
        }
        FieldType::Boolean => {
            parse_bool(&text)?.cmp(&c.value.as_bool().expect("boolean operand"))
        }
        FieldType::Date => {
            let right = parse_timestamp(c.value.as_str().expect("date operand")).expect("date");
            parse_timestamp(&text)?.cmp(&right)
        }
        FieldType::Text => unreachable!(),
    };

    Some(match c.operator.as_str() {
        "=" => ord == Ordering::Equal,
        "!=" => ord != Ordering::Equal,
        ">" => ord == Ordering::Greater,
        "<" => ord == Ordering::Less,
        ">=" => ord != Ordering::Less,
        "<=" => ord != Ordering::Greater,
        other => panic!("oracle: unexpected operator {other}"),
    })
}
