use crate::error::SchemaError;
use crate::record::NodeType;
use medgraph_api::{GraphStore, IndexKind, PredicateDef, ScalarType, SchemaDef};
use std::collections::BTreeSet;

/// Collects node type declarations and issues them to a store once.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    def: SchemaDef,
    declared: BTreeSet<String>,
    applied: bool,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `node_type` with its fields.
    ///
    /// Index kinds, `@unique` and edge directives travel on each [`PredicateDef`].
    /// Predicates are global, so a field shared with an earlier type must be declared
    /// identically.
    pub fn declare(
        &mut self,
        node_type: &str,
        fields: impl IntoIterator<Item = PredicateDef>,
    ) -> Result<(), SchemaError> {
        if !self.declared.insert(node_type.to_string()) {
            return Err(SchemaError::DuplicateType(node_type.to_string()));
        }
        let mut names = Vec::new();
        for def in fields {
            names.push(def.name.clone());
            self.def.add_predicate(def).map_err(SchemaError::Invalid)?;
        }
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        self.def.add_type(node_type, &names);
        Ok(())
    }

    /// Fields of `node_type` carrying `kind`, in declaration order.
    pub fn indexed_fields(&self, node_type: &str, kind: IndexKind) -> Vec<&str> {
        self.def
            .type_def(node_type)
            .map(|t| {
                t.fields
                    .iter()
                    .filter(|f| self.def.predicate(f).is_some_and(|d| d.has_index(kind)))
                    .map(String::as_str)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn definition(&self) -> &SchemaDef {
        &self.def
    }

    pub fn is_applied(&self) -> bool {
        self.applied
    }

    /// Sends the schema to `store`. Later calls on the same registry are no-ops and
    /// return `false`.
    pub fn apply<S: GraphStore>(&mut self, store: &S) -> Result<bool, SchemaError> {
        if self.applied {
            return Ok(false);
        }
        store.alter(&self.def).map_err(SchemaError::Rejected)?;
        self.applied = true;
        tracing::info!(
            types = self.def.types.len(),
            predicates = self.def.predicates.len(),
            "schema applied"
        );
        Ok(true)
    }

    /// The hospital graph: seven node types and their edges.
    pub fn hospital() -> Result<Self, SchemaError> {
        let mut reg = Self::new();

        reg.declare(
            NodeType::Doctor.type_name(),
            [
                key("doctor_id"),
                term("name"),
                term("last_name"),
                text("specialty"),
                text("email"),
                exact("license_id"),
                PredicateDef::edge("applies_treatment").list(),
            ],
        )?;
        reg.declare(
            NodeType::Diagnosis.type_name(),
            [key("diagnosis_id"), term("disease_name"), exact("icd10_code")],
        )?;
        reg.declare(
            NodeType::Medication.type_name(),
            [
                key("medication_id"),
                term("trade_name"),
                text("dosage"),
                text("frequency"),
            ],
        )?;
        reg.declare(
            NodeType::Treatment.type_name(),
            [
                key("treatment_id"),
                term("treatment_name"),
                PredicateDef::new("start_date", ScalarType::DateTime),
                PredicateDef::new("end_date", ScalarType::DateTime),
                PredicateDef::edge("contains_medication"),
                PredicateDef::edge("common_for_diagnosis"),
            ],
        )?;
        reg.declare(
            NodeType::Patient.type_name(),
            [
                key("patient_id"),
                term("name"),
                term("last_name"),
                PredicateDef::new("age", ScalarType::Int).index(IndexKind::Int),
                text("genre"),
                text("allergies"),
                PredicateDef::new("height", ScalarType::Float),
                PredicateDef::new("weight", ScalarType::Float),
                text("telephone"),
                text("email"),
                PredicateDef::edge("assigned_to"),
                PredicateDef::edge("has_diagnosis").list().reverse().count(),
                PredicateDef::edge("follows_treatment").list().reverse().count(),
                PredicateDef::edge("receives_medication").list(),
                PredicateDef::edge("has_vital_sign").list(),
                PredicateDef::edge("has_visitor").list(),
            ],
        )?;
        reg.declare(
            NodeType::VitalSignReading.type_name(),
            [
                key("reading_id"),
                text("type"),
                PredicateDef::new("value", ScalarType::Float),
                text("unit"),
                day("timestamp"),
            ],
        )?;
        reg.declare(
            NodeType::Visitor.type_name(),
            [
                key("visitor_id"),
                text("visitor_name"),
                day("arrival_time"),
                day("exit_time"),
            ],
        )?;
        Ok(reg)
    }
}

fn text(name: &str) -> PredicateDef {
    PredicateDef::new(name, ScalarType::String)
}

fn exact(name: &str) -> PredicateDef {
    text(name).index(IndexKind::Exact)
}

fn term(name: &str) -> PredicateDef {
    text(name).index(IndexKind::Term)
}

fn key(name: &str) -> PredicateDef {
    exact(name).unique()
}

fn day(name: &str) -> PredicateDef {
    PredicateDef::new(name, ScalarType::DateTime).index(IndexKind::Day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use medgraph_storage::MemGraph;

    #[test]
    fn hospital_schema_is_consistent() {
        let reg = SchemaRegistry::hospital().unwrap();
        let def = reg.definition();
        def.validate().unwrap();
        for t in NodeType::ALL {
            assert!(def.type_def(t.type_name()).is_some(), "{t} missing");
            if let Some(k) = t.natural_key() {
                assert!(def.predicate(k).is_some_and(|p| p.unique));
            }
        }
        assert_eq!(
            reg.indexed_fields("PATIENT", IndexKind::Term),
            vec!["name", "last_name"]
        );
        let text = def.render();
        assert!(text.contains("has_diagnosis: [uid] @reverse @count ."));
        assert!(text.contains("assigned_to: uid ."));
    }

    #[test]
    fn apply_runs_once() {
        let store = MemGraph::in_memory();
        let mut reg = SchemaRegistry::hospital().unwrap();
        assert!(reg.apply(&store).unwrap());
        assert!(!reg.apply(&store).unwrap());

        // a fresh registry with the same definition is accepted by the same store
        let mut again = SchemaRegistry::hospital().unwrap();
        assert!(again.apply(&store).unwrap());
    }

    #[test]
    fn conflicting_index_kind_is_a_schema_error() {
        let store = MemGraph::in_memory();
        SchemaRegistry::hospital().unwrap().apply(&store).unwrap();

        let mut other = SchemaRegistry::new();
        other.declare("DOCTOR", [exact("name")]).unwrap();
        let err = other.apply(&store).unwrap_err();
        assert!(matches!(err, SchemaError::Rejected(_)));
    }

    #[test]
    fn type_is_declared_once() {
        let mut reg = SchemaRegistry::new();
        reg.declare("DOCTOR", [key("doctor_id")]).unwrap();
        assert!(matches!(
            reg.declare("DOCTOR", [key("doctor_id")]),
            Err(SchemaError::DuplicateType(_))
        ));
    }
}
