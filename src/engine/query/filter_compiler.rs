use serde_json::Value;

use crate::engine::catalog::{FieldDescriptor, TableCatalog};
use crate::engine::errors::QueryError;
use crate::engine::query::filter::{BoolOp, FilterCondition, FilterGroup, FilterNode, FilterOperator};
use crate::engine::query::predicate::{Accessor, Clause, CompareOp, Predicate};
use crate::engine::types::{FieldType, ScalarValue, parse_timestamp};

const TEXT_OPERATORS: &[FilterOperator] = &[
    FilterOperator::Equals,
    FilterOperator::NotEquals,
    FilterOperator::Contains,
    FilterOperator::NotContains,
    FilterOperator::StartsWith,
    FilterOperator::EndsWith,
    FilterOperator::IsEmpty,
    FilterOperator::IsNotEmpty,
];

const ORDERED_OPERATORS: &[FilterOperator] = &[
    FilterOperator::Equals,
    FilterOperator::NotEquals,
    FilterOperator::GreaterThan,
    FilterOperator::LessThan,
    FilterOperator::GreaterOrEqual,
    FilterOperator::LessOrEqual,
    FilterOperator::IsEmpty,
    FilterOperator::IsNotEmpty,
];

const BOOLEAN_OPERATORS: &[FilterOperator] = &[
    FilterOperator::Equals,
    FilterOperator::NotEquals,
    FilterOperator::IsEmpty,
    FilterOperator::IsNotEmpty,
];

/// Operators legal for a declared field type.
pub fn legal_operators(field_type: FieldType) -> &'static [FilterOperator] {
    match field_type {
        FieldType::Text => TEXT_OPERATORS,
        FieldType::Number | FieldType::Date => ORDERED_OPERATORS,
        FieldType::Boolean => BOOLEAN_OPERATORS,
    }
}

/// Escapes `LIKE` metacharacters so user text matches literally.
pub fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Compiles a filter tree into a parameterized predicate.
pub fn compile_filter(catalog: &TableCatalog, node: &FilterNode) -> Result<Predicate, QueryError> {
    let mut compiler = FilterCompiler::new(catalog);
    let clause = compiler.compile_node(node)?;
    Ok(Predicate::new(clause, compiler.args))
}

/// Walks a filter tree, collecting positional arguments in clause order.
pub struct FilterCompiler<'a> {
    catalog: &'a TableCatalog,
    args: Vec<ScalarValue>,
}

impl<'a> FilterCompiler<'a> {
    pub fn new(catalog: &'a TableCatalog) -> Self {
        Self {
            catalog,
            args: Vec::new(),
        }
    }

    fn compile_node(&mut self, node: &FilterNode) -> Result<Option<Clause>, QueryError> {
        match node {
            FilterNode::Condition(condition) => self.compile_condition(condition).map(Some),
            FilterNode::Group(group) => self.compile_group(group),
        }
    }

    fn compile_group(&mut self, group: &FilterGroup) -> Result<Option<Clause>, QueryError> {
        if group.operator.is_empty() && group.conditions.is_empty() {
            return Ok(None);
        }
        let op: BoolOp = group.operator.parse()?;

        let mut clauses = Vec::with_capacity(group.conditions.len());
        for child in &group.conditions {
            // Empty nested groups contribute nothing.
            if let Some(clause) = self.compile_node(child)? {
                clauses.push(clause);
            }
        }

        Ok(match clauses.len() {
            0 => None,
            1 => clauses.pop(),
            _ => Some(Clause::Group { op, clauses }),
        })
    }

    fn compile_condition(&mut self, condition: &FilterCondition) -> Result<Clause, QueryError> {
        let field = self
            .catalog
            .resolve(&condition.field_id)
            .ok_or_else(|| QueryError::UnknownField {
                field_id: condition.field_id.clone(),
            })?;

        let op = FilterOperator::parse(&condition.operator)
            .filter(|op| legal_operators(field.field_type).contains(op))
            .ok_or_else(|| QueryError::UnsupportedOperator {
                field: field.name.clone(),
                field_type: field.field_type,
                operator: condition.operator.clone(),
            })?;

        let accessor = Accessor::new(field.storage_key.clone(), field.field_type.cast());

        let empty_string = field.field_type == FieldType::Text;
        let value = || decode_value(field, &condition.value);
        let (cmp, arg) = match op {
            FilterOperator::IsEmpty | FilterOperator::IsNotEmpty => {
                return Ok(Clause::IsEmpty {
                    accessor,
                    negated: op == FilterOperator::IsNotEmpty,
                    empty_string,
                });
            }
            FilterOperator::Equals => (CompareOp::Eq, value()?),
            FilterOperator::NotEquals => (CompareOp::Neq, value()?),
            FilterOperator::GreaterThan => (CompareOp::Gt, value()?),
            FilterOperator::LessThan => (CompareOp::Lt, value()?),
            FilterOperator::GreaterOrEqual => (CompareOp::Gte, value()?),
            FilterOperator::LessOrEqual => (CompareOp::Lte, value()?),
            FilterOperator::Contains => (CompareOp::Like, like_pattern(&value()?, true, true)),
            FilterOperator::NotContains => {
                (CompareOp::NotLike, like_pattern(&value()?, true, true))
            }
            FilterOperator::StartsWith => (CompareOp::Like, like_pattern(&value()?, false, true)),
            FilterOperator::EndsWith => (CompareOp::Like, like_pattern(&value()?, true, false)),
        };

        self.args.push(arg);
        Ok(Clause::Compare {
            accessor,
            op: cmp,
            param: self.args.len() - 1,
        })
    }
}

fn like_pattern(value: &ScalarValue, leading: bool, trailing: bool) -> ScalarValue {
    let text = value.as_str().unwrap_or_default();
    let mut pattern = String::with_capacity(text.len() + 2);
    if leading {
        pattern.push('%');
    }
    pattern.push_str(&escape_like(text));
    if trailing {
        pattern.push('%');
    }
    ScalarValue::Utf8(pattern)
}

/// Decodes a condition value into the shape expected by the field's type.
fn decode_value(field: &FieldDescriptor, value: &Value) -> Result<ScalarValue, QueryError> {
    let invalid = |reason: &str| QueryError::InvalidValueFormat {
        field: field.name.clone(),
        field_type: field.field_type,
        reason: reason.to_string(),
    };

    match field.field_type {
        FieldType::Text => value
            .as_str()
            .map(|s| ScalarValue::Utf8(s.to_string()))
            .ok_or_else(|| invalid("expected a string")),
        FieldType::Number => value
            .as_f64()
            .map(ScalarValue::Float64)
            .ok_or_else(|| invalid("expected a number")),
        FieldType::Boolean => value
            .as_bool()
            .map(ScalarValue::Boolean)
            .ok_or_else(|| invalid("expected a boolean")),
        FieldType::Date => value
            .as_str()
            .and_then(parse_timestamp)
            .map(ScalarValue::Timestamp)
            .ok_or_else(|| invalid("expected a date string")),
    }
}
