use std::fmt::Write;

use crate::engine::query::filter::BoolOp;
use crate::engine::types::{Cast, ScalarValue};

/// Typed access to one key of the record payload, with the cast chosen by
/// the field's declared type.
#[derive(Debug, Clone, PartialEq)]
pub struct Accessor {
    pub storage_key: String,
    pub cast: Cast,
}

impl Accessor {
    pub fn new(storage_key: impl Into<String>, cast: Cast) -> Self {
        Self {
            storage_key: storage_key.into(),
            cast,
        }
    }

    /// `data ->> 'key'`, with the key quoted as a SQL literal.
    pub fn text_sql(&self) -> String {
        format!("data ->> '{}'", self.storage_key.replace('\'', "''"))
    }

    /// The text accessor wrapped in the type cast, e.g. `(data ->> 'k')::numeric`.
    pub fn typed_sql(&self) -> String {
        match self.cast {
            Cast::None => self.text_sql(),
            cast => format!("({}){}", self.text_sql(), cast.sql_suffix()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Neq,
    Gt,
    Lt,
    Gte,
    Lte,
    Like,
    NotLike,
}

impl CompareOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Neq => "!=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Gte => ">=",
            CompareOp::Lte => "<=",
            CompareOp::Like => "LIKE",
            CompareOp::NotLike => "NOT LIKE",
        }
    }
}

/// One node of a compiled predicate. Values never appear inline: comparisons
/// reference a positional argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Compare {
        accessor: Accessor,
        op: CompareOp,
        /// Zero-based index into the predicate's argument list.
        param: usize,
    },
    /// Missing value test. With `empty_string` set, an empty string also
    /// counts as missing (text fields only).
    IsEmpty {
        accessor: Accessor,
        negated: bool,
        empty_string: bool,
    },
    Group {
        op: BoolOp,
        clauses: Vec<Clause>,
    },
}

impl Clause {
    fn write_sql(&self, out: &mut String) {
        match self {
            Clause::Compare {
                accessor,
                op,
                param,
            } => {
                let lhs = match op {
                    CompareOp::Like | CompareOp::NotLike => accessor.text_sql(),
                    _ => accessor.typed_sql(),
                };
                let _ = write!(out, "{} {} ${}", lhs, op.as_sql(), param + 1);
            }
            Clause::IsEmpty {
                accessor,
                negated,
                empty_string,
            } => {
                let key = accessor.text_sql();
                match (negated, empty_string) {
                    (false, true) => {
                        let _ = write!(out, "({key} IS NULL OR {key} = '')");
                    }
                    (true, true) => {
                        let _ = write!(out, "({key} IS NOT NULL AND {key} != '')");
                    }
                    (false, false) => {
                        let _ = write!(out, "{key} IS NULL");
                    }
                    (true, false) => {
                        let _ = write!(out, "{key} IS NOT NULL");
                    }
                }
            }
            Clause::Group { op, clauses } => {
                let wrap = clauses.len() > 1;
                if wrap {
                    out.push('(');
                }
                for (i, clause) in clauses.iter().enumerate() {
                    if i > 0 {
                        let _ = write!(out, " {} ", op.as_str());
                    }
                    clause.write_sql(out);
                }
                if wrap {
                    out.push(')');
                }
            }
        }
    }
}

/// Compiled filter: an optional clause tree plus its positional arguments.
/// An absent clause means "no constraint".
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Predicate {
    clause: Option<Clause>,
    args: Vec<ScalarValue>,
}

impl Predicate {
    pub fn new(clause: Option<Clause>, args: Vec<ScalarValue>) -> Self {
        Self { clause, args }
    }

    /// Matches every record.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.clause.is_none()
    }

    pub fn clause(&self) -> Option<&Clause> {
        self.clause.as_ref()
    }

    pub fn args(&self) -> &[ScalarValue] {
        &self.args
    }

    /// Renders the clause as a Postgres `WHERE` fragment using `$n`
    /// placeholders that bind to [`Predicate::args`] in order.
    pub fn to_sql(&self) -> Option<String> {
        self.clause.as_ref().map(|clause| {
            let mut out = String::new();
            clause.write_sql(&mut out);
            out
        })
    }
}
