use serde_json::{Map, Number, Value};
use std::cmp::Ordering as CmpOrdering;

use crate::engine::errors::StoreError;
use crate::engine::query::aggregate::{AggregateFunction, AggregateSpec};
use crate::engine::query::filter::BoolOp;
use crate::engine::query::predicate::{Accessor, Clause, CompareOp, Predicate};
use crate::engine::query::sort::{NullsOrder, Ordering, SortDirection};
use crate::engine::types::{Cast, ScalarValue, text_of};

type Payload = Map<String, Value>;

/// True when the predicate evaluates to TRUE for `data`. Unknown (NULL)
/// results do not match, as in a SQL `WHERE`.
pub fn matches(predicate: &Predicate, data: &Payload) -> bool {
    match predicate.clause() {
        Some(clause) => eval(clause, predicate.args(), data) == Some(true),
        None => true,
    }
}

/// Three-valued evaluation; `None` is SQL UNKNOWN.
fn eval(clause: &Clause, args: &[ScalarValue], data: &Payload) -> Option<bool> {
    match clause {
        Clause::Compare {
            accessor,
            op,
            param,
        } => {
            let arg = args.get(*param).filter(|a| !a.is_null())?;
            match op {
                CompareOp::Like | CompareOp::NotLike => {
                    let text = raw_text(accessor, data)?;
                    let hit = like_match(&text, arg.as_str()?);
                    Some(hit == (*op == CompareOp::Like))
                }
                _ => {
                    let value = typed_value(accessor, data);
                    if value.is_null() {
                        return None;
                    }
                    holds(*op, value.compare(arg))
                }
            }
        }
        Clause::IsEmpty {
            accessor,
            negated,
            empty_string,
        } => {
            let text = raw_text(accessor, data);
            let empty = match text.as_deref() {
                None => true,
                Some("") => *empty_string,
                Some(_) => false,
            };
            Some(empty != *negated)
        }
        Clause::Group { op, clauses } => {
            let mut unknown = false;
            for child in clauses {
                match (op, eval(child, args, data)) {
                    (BoolOp::And, Some(false)) => return Some(false),
                    (BoolOp::Or, Some(true)) => return Some(true),
                    (_, None) => unknown = true,
                    _ => {}
                }
            }
            if unknown {
                None
            } else {
                Some(*op == BoolOp::And)
            }
        }
    }
}

fn holds(op: CompareOp, ord: CmpOrdering) -> Option<bool> {
    match op {
        CompareOp::Eq => Some(ord == CmpOrdering::Equal),
        CompareOp::Neq => Some(ord != CmpOrdering::Equal),
        CompareOp::Gt => Some(ord == CmpOrdering::Greater),
        CompareOp::Lt => Some(ord == CmpOrdering::Less),
        CompareOp::Gte => Some(ord != CmpOrdering::Less),
        CompareOp::Lte => Some(ord != CmpOrdering::Greater),
        CompareOp::Like | CompareOp::NotLike => None,
    }
}

fn raw_text(accessor: &Accessor, data: &Payload) -> Option<String> {
    data.get(&accessor.storage_key).and_then(text_of)
}

/// Value under the accessor's cast. Values that do not cast are NULL.
fn typed_value(accessor: &Accessor, data: &Payload) -> ScalarValue {
    accessor
        .cast
        .apply(data.get(&accessor.storage_key))
        .unwrap_or(ScalarValue::Null)
}

/// `LIKE` matching: `%` is any run, `_` is one character, `\` escapes the
/// next character. Case-sensitive.
pub fn like_match(text: &str, pattern: &str) -> bool {
    #[derive(PartialEq)]
    enum Token {
        Any,
        One,
        Lit(char),
    }

    let mut tokens = Vec::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '%' => Token::Any,
            '_' => Token::One,
            '\\' => Token::Lit(chars.next().unwrap_or('\\')),
            c => Token::Lit(c),
        });
    }

    let text: Vec<char> = text.chars().collect();
    let (mut t, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match tokens.get(p) {
            Some(Token::Any) => {
                backtrack = Some((p, t));
                p += 1;
                continue;
            }
            Some(Token::One) => {
                t += 1;
                p += 1;
                continue;
            }
            Some(Token::Lit(c)) if *c == text[t] => {
                t += 1;
                p += 1;
                continue;
            }
            _ => {}
        }
        match backtrack {
            Some((star, start)) => {
                p = star + 1;
                t = start + 1;
                backtrack = Some((star, start + 1));
            }
            None => return false,
        }
    }

    tokens[p..].iter().all(|token| *token == Token::Any)
}

/// Compares two payloads under a composite ordering, honoring each key's
/// nulls placement.
pub fn compare_payloads(ordering: &Ordering, a: &Payload, b: &Payload) -> CmpOrdering {
    for key in ordering.keys() {
        let left = typed_value(&key.accessor, a);
        let right = typed_value(&key.accessor, b);
        let nulls_first = key.nulls == NullsOrder::First;
        let ord = match (left.is_null(), right.is_null()) {
            (true, true) => CmpOrdering::Equal,
            (true, false) if nulls_first => CmpOrdering::Less,
            (true, false) => CmpOrdering::Greater,
            (false, true) if nulls_first => CmpOrdering::Greater,
            (false, true) => CmpOrdering::Less,
            (false, false) => match key.direction {
                SortDirection::Ascending => left.compare(&right),
                SortDirection::Descending => right.compare(&left),
            },
        };
        if ord != CmpOrdering::Equal {
            return ord;
        }
    }
    CmpOrdering::Equal
}

/// Computes one aggregate over the given payloads. `count` counts non-null
/// values; the numeric functions skip nulls, fail on values that do not cast
/// to numeric and yield 0 when nothing is left.
pub fn aggregate<'a>(
    spec: &AggregateSpec,
    rows: impl Iterator<Item = &'a Payload>,
) -> Result<Value, StoreError> {
    if spec.function == AggregateFunction::Count {
        let count = rows
            .filter(|data| raw_text(&spec.accessor, data).is_some())
            .count();
        return Ok(Value::from(count as u64));
    }

    let mut values = Vec::new();
    for data in rows {
        let raw = data.get(&spec.accessor.storage_key);
        match Cast::Numeric.apply(raw) {
            Some(ScalarValue::Float64(v)) => values.push(v),
            Some(_) => {}
            None => {
                return Err(StoreError::Cast {
                    key: spec.accessor.storage_key.clone(),
                    target: "numeric",
                    value: raw.map(|v| v.to_string()).unwrap_or_default(),
                });
            }
        }
    }

    if values.is_empty() {
        return Ok(Value::from(0));
    }
    let result = match spec.function {
        AggregateFunction::Sum => values.iter().sum(),
        AggregateFunction::Avg => values.iter().sum::<f64>() / values.len() as f64,
        AggregateFunction::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        AggregateFunction::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        AggregateFunction::Count => values.len() as f64,
    };
    Ok(number(result))
}

/// Whole numbers serialize as integers.
fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        return Value::from(value as i64);
    }
    Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
