use crate::schema::ScalarType;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Scalar property value stored on a node.
///
/// Absent properties are simply missing from the node's map; there is no null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    DateTime(DateTime<Utc>),
}

impl PropertyValue {
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            PropertyValue::Bool(_) => ScalarType::Bool,
            PropertyValue::Int(_) => ScalarType::Int,
            PropertyValue::Float(_) => ScalarType::Float,
            PropertyValue::String(_) => ScalarType::String,
            PropertyValue::DateTime(_) => ScalarType::DateTime,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(f) => Some(*f),
            PropertyValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            PropertyValue::DateTime(t) => Some(*t),
            _ => None,
        }
    }

    /// Parses raw text into a value of the given scalar type.
    ///
    /// Returns `None` when the text does not parse, or for [`ScalarType::Uid`], which
    /// has no scalar representation.
    pub fn parse_as(raw: &str, ty: ScalarType) -> Option<Self> {
        let raw = raw.trim();
        match ty {
            ScalarType::String => Some(PropertyValue::String(raw.to_string())),
            ScalarType::Int => raw.parse().ok().map(PropertyValue::Int),
            ScalarType::Float => raw
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(PropertyValue::Float),
            ScalarType::Bool => match raw.to_ascii_lowercase().as_str() {
                "true" | "t" | "yes" | "y" | "1" => Some(PropertyValue::Bool(true)),
                "false" | "f" | "no" | "n" | "0" => Some(PropertyValue::Bool(false)),
                _ => None,
            },
            ScalarType::DateTime => parse_datetime(raw).map(PropertyValue::DateTime),
            ScalarType::Uid => None,
        }
    }

    /// Orders two values of comparable types.
    ///
    /// Ints and floats compare numerically with each other; any other mix of types is
    /// incomparable.
    pub fn compare(&self, other: &PropertyValue) -> Option<Ordering> {
        match (self, other) {
            (PropertyValue::Int(a), PropertyValue::Int(b)) => Some(a.cmp(b)),
            (PropertyValue::Float(_), PropertyValue::Int(_))
            | (PropertyValue::Int(_), PropertyValue::Float(_))
            | (PropertyValue::Float(_), PropertyValue::Float(_)) => {
                self.as_float()?.partial_cmp(&other.as_float()?)
            }
            (PropertyValue::String(a), PropertyValue::String(b)) => Some(a.cmp(b)),
            (PropertyValue::DateTime(a), PropertyValue::DateTime(b)) => Some(a.cmp(b)),
            (PropertyValue::Bool(a), PropertyValue::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(b) => write!(f, "{b}"),
            PropertyValue::Int(i) => write!(f, "{i}"),
            PropertyValue::Float(x) => write!(f, "{x}"),
            PropertyValue::String(s) => f.write_str(s),
            PropertyValue::DateTime(t) => write!(f, "{}", t.to_rfc3339()),
        }
    }
}

/// Parses the datetime spellings found in source files and query parameters.
///
/// Accepts RFC 3339 (`2024-03-01T10:00:00Z`), naive `YYYY-MM-DDTHH:MM:SS` or
/// `YYYY-MM-DD HH:MM:SS` (taken as UTC), and bare dates (midnight UTC).
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(t.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
}
