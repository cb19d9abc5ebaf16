use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Number, Value as JsonValue};

/// Declared type of a field. Drives both the accessor cast and the legal
/// operator set when compiling filters and sorts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Number,
    Boolean,
    Date,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
        }
    }

    /// The cast applied to the raw text accessor for this type.
    pub fn cast(&self) -> Cast {
        match self {
            FieldType::Text => Cast::None,
            FieldType::Number => Cast::Numeric,
            FieldType::Boolean => Cast::Boolean,
            FieldType::Date => Cast::Timestamp,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "string" => Ok(FieldType::Text),
            "number" | "numeric" => Ok(FieldType::Number),
            "boolean" | "bool" => Ok(FieldType::Boolean),
            "date" | "datetime" | "timestamp" => Ok(FieldType::Date),
            _ => Err(()),
        }
    }
}

/// Cast strategy applied on top of the text accessor `data ->> key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cast {
    None,
    Numeric,
    Boolean,
    Timestamp,
}

impl Cast {
    /// Postgres cast suffix, empty for text.
    pub fn sql_suffix(&self) -> &'static str {
        match self {
            Cast::None => "",
            Cast::Numeric => "::numeric",
            Cast::Boolean => "::boolean",
            Cast::Timestamp => "::timestamp",
        }
    }

    /// Applies the cast to a raw JSON payload value. Missing keys and JSON
    /// null yield `Null`; values that cannot be cast yield `None`.
    pub fn apply(&self, raw: Option<&JsonValue>) -> Option<ScalarValue> {
        let text = match raw.and_then(text_of) {
            Some(text) => text,
            None => return Some(ScalarValue::Null),
        };
        match self {
            Cast::None => Some(ScalarValue::Utf8(text)),
            Cast::Numeric => match raw {
                Some(JsonValue::Number(n)) => n.as_f64().map(ScalarValue::Float64),
                _ => text.trim().parse::<f64>().ok().map(ScalarValue::Float64),
            },
            Cast::Boolean => parse_bool(&text).map(ScalarValue::Boolean),
            Cast::Timestamp => parse_timestamp(&text).map(ScalarValue::Timestamp),
        }
    }
}

/// Text form of a payload value, mirroring the `->>` operator: strings are
/// unquoted, scalars are printed, objects/arrays are serialized, null is absent.
pub fn text_of(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Bool(b) => Some(b.to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "on" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Parses RFC3339, `YYYY-MM-DD HH:MM:SS[.f]`, `YYYY-MM-DDTHH:MM:SS[.f]`
/// or a bare `YYYY-MM-DD` into epoch milliseconds (UTC).
pub fn parse_timestamp(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Null,
    Boolean(bool),
    Float64(f64),
    /// Epoch milliseconds, UTC.
    Timestamp(i64),
    Utf8(String),
}

impl ScalarValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScalarValue::Utf8(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Float64(f) => Some(*f),
            ScalarValue::Timestamp(ts) => Some(*ts as f64),
            _ => None,
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            ScalarValue::Null => JsonValue::Null,
            ScalarValue::Boolean(b) => JsonValue::Bool(*b),
            ScalarValue::Float64(f) => Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            ScalarValue::Timestamp(ts) => JsonValue::Number(Number::from(*ts)),
            ScalarValue::Utf8(s) => JsonValue::String(s.clone()),
        }
    }

    /// Orders two non-null values of the same variant. Mixed variants
    /// compare equal; callers compare values produced by one cast only.
    /// `-0.0` and `0.0` are equal, as in `numeric`.
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (ScalarValue::Boolean(a), ScalarValue::Boolean(b)) => a.cmp(b),
            (ScalarValue::Float64(a), ScalarValue::Float64(b)) => (a + 0.0).total_cmp(&(b + 0.0)),
            (ScalarValue::Timestamp(a), ScalarValue::Timestamp(b)) => a.cmp(b),
            (ScalarValue::Utf8(a), ScalarValue::Utf8(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Null => f.write_str("NULL"),
            ScalarValue::Boolean(b) => write!(f, "{b}"),
            ScalarValue::Float64(v) => write!(f, "{v}"),
            ScalarValue::Timestamp(ts) => write!(f, "{ts}"),
            ScalarValue::Utf8(s) => write!(f, "'{s}'"),
        }
    }
}

impl Serialize for ScalarValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}
