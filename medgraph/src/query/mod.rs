//! Read-only query library over a loaded hospital graph.
//!
//! Every query is a fixed template whose parameters are passed as values into store
//! predicates; no query text is ever assembled from input. [`QueryLibrary`] exposes the
//! templates as typed methods and [`prepare`] exposes them by name for callers that
//! only have text parameters.

mod catalog;
mod params;

pub use catalog::{CATALOG, ParamSpec, PreparedQuery, QueryTemplate, prepare};
pub use params::{ParamKind, Params};

use crate::error::QueryError;
use crate::record::NodeType;
use crate::resolver::Resolver;
use chrono::{DateTime, SecondsFormat, Utc};
use medgraph_api::{
    Filter, GraphSnapshot, IndexKind, NodeId, NodeQuery, PropertyValue, RootFunc, ScalarType,
};
use serde::ser::{SerializeMap, SerializeSeq};
use std::collections::{BTreeMap, BTreeSet};

/// Patients per page of `paginated-cohort`.
pub const PAGE_SIZE: usize = 50;

type QueryResult<T> = std::result::Result<T, QueryError>;

/// A value in a query result or parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    DateTime(DateTime<Utc>),
    Uid(NodeId),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_uid(&self) -> Option<NodeId> {
        match self {
            Value::Uid(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Converts to a store value of type `ty`, parsing text when needed.
    pub fn to_property(&self, ty: ScalarType) -> Option<PropertyValue> {
        match (self, ty) {
            (Value::Bool(b), ScalarType::Bool) => Some(PropertyValue::Bool(*b)),
            (Value::Int(i), ScalarType::Int) => Some(PropertyValue::Int(*i)),
            (Value::Int(i), ScalarType::Float) => Some(PropertyValue::Float(*i as f64)),
            (Value::Float(f), ScalarType::Float) => Some(PropertyValue::Float(*f)),
            (Value::DateTime(t), ScalarType::DateTime) => Some(PropertyValue::DateTime(*t)),
            (Value::String(s), ty) => PropertyValue::parse_as(s, ty),
            (Value::Int(i), ty) => PropertyValue::parse_as(&i.to_string(), ty),
            (Value::Float(f), ScalarType::String) => Some(PropertyValue::String(f.to_string())),
            (Value::Bool(b), ScalarType::String) => Some(PropertyValue::String(b.to_string())),
            (Value::DateTime(t), ScalarType::String) => Some(PropertyValue::String(
                t.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            )),
            _ => None,
        }
    }
}

impl From<&PropertyValue> for Value {
    fn from(v: &PropertyValue) -> Self {
        match v {
            PropertyValue::Bool(b) => Value::Bool(*b),
            PropertyValue::Int(i) => Value::Int(*i),
            PropertyValue::Float(f) => Value::Float(*f),
            PropertyValue::String(s) => Value::String(s.clone()),
            PropertyValue::DateTime(t) => Value::DateTime(*t),
        }
    }
}

impl serde::Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::DateTime(t) => {
                serializer.serialize_str(&t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Value::Uid(id) => serializer.collect_str(id),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(m) => {
                let mut map = serializer.serialize_map(Some(m.len()))?;
                for (k, v) in m {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

/// One result record; columns keep their projection order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cols: Vec<(String, Value)>,
}

impl Row {
    pub fn new(cols: Vec<(String, Value)>) -> Self {
        Self { cols }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.cols.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        let name = name.into();
        if let Some((_, v)) = self.cols.iter_mut().find(|(k, _)| *k == name) {
            *v = value;
        } else {
            self.cols.push((name, value));
        }
        self
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.cols.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn into_map(self) -> BTreeMap<String, Value> {
        self.cols.into_iter().collect()
    }
}

impl serde::Serialize for Row {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cols.len()))?;
        for (k, v) in &self.cols {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

const PATIENT_BRIEF: &[&str] = &["patient_id", "name", "last_name", "age"];
const PATIENT_HEADER: &[&str] = &["patient_id", "name", "last_name"];
const READING_FIELDS: &[&str] = &["reading_id", "type", "value", "unit", "timestamp"];
const VISITOR_FIELDS: &[&str] = &["visitor_id", "visitor_name", "arrival_time", "exit_time"];

/// Typed entry points to the query catalog over one snapshot.
pub struct QueryLibrary<'a, S: GraphSnapshot> {
    snapshot: &'a S,
    resolver: Option<&'a Resolver>,
}

impl<'a, S: GraphSnapshot> QueryLibrary<'a, S> {
    pub fn new(snapshot: &'a S) -> Self {
        Self {
            snapshot,
            resolver: None,
        }
    }

    /// Consults `resolver` before the store for natural-key lookups.
    pub fn with_resolver(mut self, resolver: &'a Resolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    fn find(&self, query: NodeQuery) -> QueryResult<Vec<NodeId>> {
        Ok(self.snapshot.find(&query)?)
    }

    fn by_key(&self, node_type: NodeType, key: &str) -> QueryResult<Option<NodeId>> {
        let Some(field) = node_type.natural_key() else {
            return Err(QueryError::invalid(
                "entity",
                format!("{node_type} has no natural key"),
            ));
        };
        if let Some(id) = self.resolver.and_then(|r| r.lookup(node_type, key)) {
            return Ok(Some(id));
        }
        let hits = self.find(NodeQuery::eq(
            node_type.type_name(),
            field,
            PropertyValue::String(key.to_string()),
        ))?;
        Ok(hits.first().copied())
    }

    /// `uid` plus the listed fields present on the node.
    fn project(&self, id: NodeId, fields: &[&str]) -> Row {
        let mut row = Row::new(vec![("uid".to_string(), Value::Uid(id))]);
        if let Some(node) = self.snapshot.node(id) {
            for field in fields {
                if let Some(v) = node.get(field) {
                    row = row.with(*field, Value::from(v));
                }
            }
        }
        row
    }

    /// `uid` plus every scalar field of the node.
    fn scalars(&self, id: NodeId) -> Row {
        let mut row = Row::new(vec![("uid".to_string(), Value::Uid(id))]);
        if let Some(node) = self.snapshot.node(id) {
            for (k, v) in &node.properties {
                row = row.with(k.as_str(), Value::from(v));
            }
        }
        row
    }

    fn nested(&self, ids: &[NodeId], fields: &[&str]) -> Value {
        Value::List(
            ids.iter()
                .map(|id| Value::Map(self.project(*id, fields).into_map()))
                .collect(),
        )
    }

    fn patient_children(
        &self,
        patient_id: &str,
        predicate: &str,
        shape: impl FnOnce(NodeQuery) -> NodeQuery,
        fields: &[&str],
    ) -> QueryResult<Vec<Row>> {
        let Some(patient) = self.by_key(NodeType::Patient, patient_id)? else {
            return Ok(Vec::new());
        };
        let children = self.snapshot.out(patient, predicate);
        let children = self.find(shape(NodeQuery::new(RootFunc::Uids(children))))?;
        let row = self
            .project(patient, PATIENT_HEADER)
            .with(predicate, self.nested(&children, fields));
        Ok(vec![row])
    }

    fn diagnoses_matching(&self, disease: &str) -> QueryResult<Vec<NodeId>> {
        self.find(
            NodeQuery::new(RootFunc::AnyOfTerms {
                field: "disease_name".into(),
                text: disease.to_string(),
            })
            .filter(Filter::Type(NodeType::Diagnosis.type_name().into())),
        )
    }

    /// The node of `node_type` with natural key `key`: scalars, `uid`, and edges as
    /// uids (lists for multi-valued predicates).
    pub fn exact_by_key(&self, node_type: NodeType, key: &str) -> QueryResult<Option<Row>> {
        let Some(id) = self.by_key(node_type, key)? else {
            return Ok(None);
        };
        let mut row = self.scalars(id);
        let schema = self.snapshot.schema();
        if let Some(ty) = schema.type_def(node_type.type_name()) {
            for field in &ty.fields {
                let Some(def) = schema.predicate(field).filter(|d| d.is_edge()) else {
                    continue;
                };
                let targets = self.snapshot.out(id, field);
                if def.list {
                    let uids = targets.into_iter().map(Value::Uid).collect();
                    row = row.with(field.as_str(), Value::List(uids));
                } else if let Some(target) = targets.first() {
                    row = row.with(field.as_str(), Value::Uid(*target));
                }
            }
        }
        Ok(Some(row))
    }

    /// Nodes of `node_type` where any term-indexed field shares a term with `text`.
    pub fn term_search(&self, node_type: NodeType, text: &str) -> QueryResult<Vec<Row>> {
        let schema = self.snapshot.schema();
        let fields: Vec<&String> = schema
            .type_def(node_type.type_name())
            .map(|t| {
                t.fields
                    .iter()
                    .filter(|f| {
                        schema
                            .predicate(f)
                            .is_some_and(|d| d.has_index(IndexKind::Term))
                    })
                    .collect()
            })
            .unwrap_or_default();
        if fields.is_empty() {
            return Err(QueryError::invalid(
                "entity",
                format!("{node_type} has no term-indexed field"),
            ));
        }
        let any = Filter::Or(
            fields
                .into_iter()
                .map(|f| Filter::AnyOfTerms {
                    field: f.clone(),
                    text: text.to_string(),
                })
                .collect(),
        );
        let ids = self.find(NodeQuery::new(RootFunc::Type(node_type.type_name().into())).filter(any))?;
        Ok(ids.into_iter().map(|id| self.scalars(id)).collect())
    }

    /// Nodes of `node_type` whose `field` is at least `min`.
    pub fn range_filter(
        &self,
        node_type: NodeType,
        field: &str,
        min: PropertyValue,
    ) -> QueryResult<Vec<Row>> {
        let schema = self.snapshot.schema();
        let declared = schema
            .type_def(node_type.type_name())
            .is_some_and(|t| t.has_field(field));
        let def = schema.predicate(field).filter(|_| declared).ok_or_else(|| {
            QueryError::invalid("field", format!("{node_type} has no field `{field}`"))
        })?;
        let type_filter = Filter::Type(node_type.type_name().into());
        let query = if def.ordered_index().is_some() {
            NodeQuery::new(RootFunc::Ge {
                field: field.to_string(),
                value: min,
            })
            .filter(type_filter)
        } else {
            NodeQuery::new(RootFunc::Type(node_type.type_name().into())).filter(Filter::Ge {
                field: field.to_string(),
                value: min,
            })
        };
        let ids = self.find(query)?;
        Ok(ids.into_iter().map(|id| self.scalars(id)).collect())
    }

    /// Diagnoses matching `disease`, each with the patients diagnosed with it.
    pub fn disease_cohort(&self, disease: &str) -> QueryResult<Vec<Row>> {
        let mut rows = Vec::new();
        for dx in self.diagnoses_matching(disease)? {
            let patients = self.snapshot.reverse(dx, "has_diagnosis")?;
            rows.push(
                self.project(dx, &["disease_name", "icd10_code"])
                    .with("patients", self.nested(&patients, PATIENT_BRIEF)),
            );
        }
        Ok(rows)
    }

    /// One page of the patients diagnosed with `disease` aged at least `min_age`.
    pub fn paginated_cohort(
        &self,
        disease: &str,
        min_age: i64,
        page: i64,
    ) -> QueryResult<Vec<Row>> {
        if page < 1 {
            return Err(QueryError::invalid("page", "pages start at 1"));
        }
        let mut cohort = BTreeSet::new();
        for dx in self.diagnoses_matching(disease)? {
            cohort.extend(self.snapshot.reverse(dx, "has_diagnosis")?);
        }
        let offset = usize::try_from(page - 1)
            .unwrap_or(usize::MAX)
            .saturating_mul(PAGE_SIZE);
        let ids = self.find(
            NodeQuery::new(RootFunc::Uids(cohort.into_iter().collect()))
                .filter(Filter::Ge {
                    field: "age".into(),
                    value: PropertyValue::Int(min_age),
                })
                .first(PAGE_SIZE)
                .offset(offset),
        )?;
        Ok(ids
            .into_iter()
            .map(|id| self.project(id, PATIENT_BRIEF))
            .collect())
    }

    /// Doctors holding `license_id`, with the treatments they apply and the
    /// diagnoses each treatment is common for.
    pub fn doctor_treatments(&self, license_id: &str) -> QueryResult<Vec<Row>> {
        let doctors = self.find(NodeQuery::eq(
            NodeType::Doctor.type_name(),
            "license_id",
            PropertyValue::String(license_id.to_string()),
        ))?;
        let mut rows = Vec::with_capacity(doctors.len());
        for doctor in doctors {
            let treatments = self
                .snapshot
                .out(doctor, "applies_treatment")
                .into_iter()
                .map(|t| {
                    let diagnoses = self.snapshot.out(t, "common_for_diagnosis");
                    let row = self
                        .project(t, &["treatment_name", "start_date", "end_date"])
                        .with(
                            "common_for_diagnosis",
                            self.nested(&diagnoses, &["disease_name", "icd10_code"]),
                        );
                    Value::Map(row.into_map())
                })
                .collect();
            rows.push(
                self.project(
                    doctor,
                    &["doctor_id", "name", "last_name", "specialty", "license_id"],
                )
                .with("applies_treatment", Value::List(treatments)),
            );
        }
        Ok(rows)
    }

    pub fn patient_medications(&self, patient_id: &str) -> QueryResult<Vec<Row>> {
        self.patient_children(
            patient_id,
            "receives_medication",
            |q| q,
            &["medication_id", "trade_name", "dosage", "frequency"],
        )
    }

    /// The patient's `count` most recent readings, newest first.
    pub fn recent_readings(&self, patient_id: &str, count: i64) -> QueryResult<Vec<Row>> {
        let count = usize::try_from(count)
            .map_err(|_| QueryError::invalid("count", "must not be negative"))?;
        self.patient_children(
            patient_id,
            "has_vital_sign",
            |q| q.order_by("timestamp", true).first(count),
            READING_FIELDS,
        )
    }

    /// The patient's readings with `start <= timestamp <= end`.
    pub fn readings_in_range(
        &self,
        patient_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> QueryResult<Vec<Row>> {
        self.patient_children(
            patient_id,
            "has_vital_sign",
            |q| q.filter(between("timestamp", start, end)),
            READING_FIELDS,
        )
    }

    /// Per diagnosis, the number of patients diagnosed with it; most common first.
    pub fn disease_counts(&self) -> QueryResult<Vec<Row>> {
        let diagnoses = self.find(NodeQuery::new(RootFunc::Type(
            NodeType::Diagnosis.type_name().into(),
        )))?;
        let mut counted = Vec::with_capacity(diagnoses.len());
        for dx in diagnoses {
            let n = self.snapshot.count_reverse(dx, "has_diagnosis")?;
            let name = self
                .snapshot
                .node(dx)
                .and_then(|n| n.get("disease_name"))
                .and_then(PropertyValue::as_str)
                .unwrap_or_default()
                .to_string();
            counted.push((n, name, dx));
        }
        counted.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));
        Ok(counted
            .into_iter()
            .map(|(n, _, dx)| {
                self.project(dx, &["disease_name", "icd10_code"])
                    .with("num_patients", Value::Int(n as i64))
            })
            .collect())
    }

    pub fn visitors_of_patient(&self, patient_id: &str) -> QueryResult<Vec<Row>> {
        self.patient_children(patient_id, "has_visitor", |q| q, VISITOR_FIELDS)
    }

    /// The patient's visitors who arrived between `start` and `end`, inclusive.
    pub fn visitors_in_range(
        &self,
        patient_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> QueryResult<Vec<Row>> {
        self.patient_children(
            patient_id,
            "has_visitor",
            |q| q.filter(between("arrival_time", start, end)),
            VISITOR_FIELDS,
        )
    }

    /// Doctors whose `doctor_id` or `license_id` equals `text`, or whose name or last
    /// name shares a term with it.
    pub fn doctor_search(&self, text: &str) -> QueryResult<Vec<Row>> {
        let exact = |field: &str| Filter::Eq {
            field: field.to_string(),
            value: PropertyValue::String(text.trim().to_string()),
        };
        let terms = |field: &str| Filter::AnyOfTerms {
            field: field.to_string(),
            text: text.to_string(),
        };
        let ids = self.find(
            NodeQuery::new(RootFunc::Type(NodeType::Doctor.type_name().into())).filter(
                Filter::Or(vec![
                    exact("doctor_id"),
                    exact("license_id"),
                    terms("name"),
                    terms("last_name"),
                ]),
            ),
        )?;
        Ok(ids
            .into_iter()
            .map(|id| {
                self.project(
                    id,
                    &["doctor_id", "license_id", "name", "last_name", "specialty", "email"],
                )
            })
            .collect())
    }
}

fn between(field: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Filter {
    Filter::Between {
        field: field.to_string(),
        low: PropertyValue::DateTime(start),
        high: PropertyValue::DateTime(end),
    }
}
