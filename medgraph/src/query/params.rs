use super::Value;
use crate::error::QueryError;
use chrono::{DateTime, Utc};
use medgraph_api::parse_datetime;
use std::collections::BTreeMap;

/// Kind of value a query parameter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Text,
    Int,
    DateTime,
    /// A node type name such as `patient` or `DOCTOR`.
    NodeType,
    /// Any scalar; converted to the field's declared type at execution.
    Scalar,
}

impl ParamKind {
    /// Parses command-line text into a value of this kind.
    pub fn parse(self, raw: &str) -> Option<Value> {
        let raw = raw.trim();
        match self {
            // scalar text is parsed once the field type is known
            ParamKind::Text | ParamKind::NodeType | ParamKind::Scalar => {
                Some(Value::String(raw.to_string()))
            }
            ParamKind::Int => raw.parse().ok().map(Value::Int),
            ParamKind::DateTime => parse_datetime(raw).map(Value::DateTime),
        }
    }
}

/// Query parameters, bound by name.
///
/// ```ignore
/// let mut params = Params::new();
/// params.insert("patient_id", Value::String("P001".into()));
/// let rows = prepare("patient-medications")?.execute(&snapshot, &params)?;
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    inner: BTreeMap<String, Value>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.inner.insert(name.into(), value);
    }

    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.inner.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.inner.keys().map(String::as_str)
    }

    pub(crate) fn required(
        &self,
        query: &'static str,
        param: &'static str,
    ) -> Result<&Value, QueryError> {
        self.get(param)
            .filter(|v| !matches!(v, Value::Null))
            .ok_or(QueryError::MissingParam { query, param })
    }

    pub(crate) fn text(&self, query: &'static str, param: &'static str) -> Result<&str, QueryError> {
        self.required(query, param)?
            .as_str()
            .ok_or_else(|| QueryError::invalid(param, "expected text"))
    }

    pub(crate) fn int(&self, query: &'static str, param: &'static str) -> Result<i64, QueryError> {
        match self.required(query, param)? {
            Value::Int(i) => Ok(*i),
            Value::String(s) => s
                .trim()
                .parse()
                .map_err(|_| QueryError::invalid(param, format!("`{s}` is not an integer"))),
            _ => Err(QueryError::invalid(param, "expected an integer")),
        }
    }

    pub(crate) fn datetime(
        &self,
        query: &'static str,
        param: &'static str,
    ) -> Result<DateTime<Utc>, QueryError> {
        match self.required(query, param)? {
            Value::DateTime(t) => Ok(*t),
            Value::String(s) => parse_datetime(s)
                .ok_or_else(|| QueryError::invalid(param, format!("`{s}` is not a datetime"))),
            _ => Err(QueryError::invalid(param, "expected a datetime")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_text_is_kept_verbatim() {
        assert_eq!(ParamKind::Scalar.parse(" 1.5 "), Some(Value::String("1.5".into())));
        assert_eq!(
            ParamKind::Scalar.parse("2024-03-01"),
            Some(Value::String("2024-03-01".into()))
        );
        assert_eq!(ParamKind::Int.parse("20"), Some(Value::Int(20)));
        assert_eq!(ParamKind::Int.parse("x"), None);
    }

    #[test]
    fn typed_getters_report_the_parameter() {
        let p = Params::new()
            .with("count", Value::String("three".into()))
            .with("start", Value::String("2024-03-01".into()));
        assert!(matches!(
            p.int("recent-readings", "count"),
            Err(QueryError::InvalidParam { ref param, .. }) if param == "count"
        ));
        assert!(p.datetime("readings-in-range", "start").is_ok());
        assert!(matches!(
            p.datetime("readings-in-range", "end"),
            Err(QueryError::MissingParam { param: "end", .. })
        ));
    }
}
