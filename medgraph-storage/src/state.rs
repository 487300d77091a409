use crate::index::{IndexKey, IndexSet};
use medgraph_api::{
    Applied, Mutation, NewNode, NodeId, NodeRecord, PredicateDef, PropertyValue, Result,
    ScalarType, SchemaDef, StoreError,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};

type UniqueKey = (String, String, IndexKey);
type Adjacency = HashMap<NodeId, BTreeMap<String, BTreeSet<NodeId>>>;

/// The complete graph as seen by one snapshot.
///
/// Writers never mutate a published state; a commit works on a clone and publishes
/// it only after every mutation of the batch applied cleanly.
#[derive(Debug, Clone, Default)]
pub struct GraphState {
    pub(crate) schema: SchemaDef,
    pub(crate) nodes: BTreeMap<NodeId, NodeRecord>,
    pub(crate) by_type: HashMap<String, BTreeSet<NodeId>>,
    pub(crate) out: Adjacency,
    pub(crate) incoming: Adjacency,
    pub(crate) indexes: IndexSet,
    unique: HashMap<UniqueKey, NodeId>,
    next_id: u64,
}

impl GraphState {
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn apply(&mut self, mutation: Mutation) -> Result<Applied> {
        match mutation {
            Mutation::Create(node) => {
                if let Some(existing) = self.find_duplicate(&node) {
                    return Ok(Applied::Duplicate { existing });
                }
                self.create_node(node).map(Applied::Created)
            }
            Mutation::Link {
                src,
                predicate,
                dst,
            } => {
                let src_type = self.type_of(src, &predicate)?;
                self.check_edge(&src_type, &predicate)?;
                if !self.nodes.contains_key(&dst) {
                    return Err(StoreError::DanglingEdge {
                        predicate,
                        target: dst,
                    });
                }
                let new_edge = self.add_edge(src, &predicate, dst);
                Ok(Applied::Linked { new_edge })
            }
            Mutation::Attach {
                owner,
                predicate,
                node,
            } => {
                let owner_type = self.type_of(owner, &predicate)?;
                self.check_edge(&owner_type, &predicate)?;
                if let Some(existing) = self.find_duplicate(&node) {
                    return Ok(Applied::Duplicate { existing });
                }
                let child = self.create_node(node)?;
                self.add_edge(owner, &predicate, child);
                Ok(Applied::Created(child))
            }
        }
    }

    fn type_of(&self, id: NodeId, predicate: &str) -> Result<String> {
        self.nodes
            .get(&id)
            .map(|n| n.type_name.clone())
            .ok_or_else(|| StoreError::DanglingEdge {
                predicate: predicate.to_string(),
                target: id,
            })
    }

    fn check_field(&self, type_name: &str, predicate: &str) -> Result<&PredicateDef> {
        let ty = self
            .schema
            .type_def(type_name)
            .ok_or_else(|| StoreError::UnknownType(type_name.to_string()))?;
        if !ty.has_field(predicate) {
            return Err(StoreError::UndeclaredPredicate {
                type_name: type_name.to_string(),
                predicate: predicate.to_string(),
            });
        }
        self.schema
            .predicate(predicate)
            .ok_or_else(|| StoreError::UnknownPredicate(predicate.to_string()))
    }

    fn check_edge(&self, type_name: &str, predicate: &str) -> Result<()> {
        let def = self.check_field(type_name, predicate)?;
        if !def.is_edge() {
            return Err(StoreError::TypeMismatch {
                predicate: predicate.to_string(),
                expected: def.ty,
                found: ScalarType::Uid,
            });
        }
        Ok(())
    }

    fn find_duplicate(&self, node: &NewNode) -> Option<NodeId> {
        node.scalars.iter().find_map(|(predicate, value)| {
            let def = self.schema.predicate(predicate).filter(|d| d.unique)?;
            let value = coerce(def, value).ok()?;
            let key = (node.type_name.clone(), predicate.clone(), IndexKey::of(&value));
            self.unique.get(&key).copied()
        })
    }

    fn create_node(&mut self, node: NewNode) -> Result<NodeId> {
        let mut properties = BTreeMap::new();
        for (predicate, value) in node.scalars {
            let def = self.check_field(&node.type_name, &predicate)?;
            let value = coerce(def, &value)?;
            properties.insert(predicate, value);
        }
        for (predicate, _) in &node.edges {
            self.check_edge(&node.type_name, predicate)?;
        }

        self.next_id += 1;
        let id = NodeId::new(self.next_id);
        self.insert_record(NodeRecord {
            id,
            type_name: node.type_name,
            properties,
        });

        for (predicate, dst) in node.edges {
            if !self.nodes.contains_key(&dst) {
                return Err(StoreError::DanglingEdge {
                    predicate,
                    target: dst,
                });
            }
            self.add_edge(id, &predicate, dst);
        }
        Ok(id)
    }

    fn insert_record(&mut self, record: NodeRecord) {
        for (predicate, value) in &record.properties {
            if let Some(def) = self.schema.predicate(predicate) {
                self.indexes.insert(def, record.id, value);
                if def.unique {
                    let key = (
                        record.type_name.clone(),
                        predicate.clone(),
                        IndexKey::of(value),
                    );
                    self.unique.insert(key, record.id);
                }
            }
        }
        self.by_type
            .entry(record.type_name.clone())
            .or_default()
            .insert(record.id);
        self.nodes.insert(record.id, record);
    }

    /// Adds `src -predicate-> dst`, replacing the previous target of a single-valued
    /// predicate. Returns false when the edge already existed.
    pub(crate) fn add_edge(&mut self, src: NodeId, predicate: &str, dst: NodeId) -> bool {
        let list = self.schema.predicate(predicate).is_none_or(|d| d.list);
        let targets = self
            .out
            .entry(src)
            .or_default()
            .entry(predicate.to_string())
            .or_default();
        if targets.contains(&dst) {
            return false;
        }
        if !list {
            for old in std::mem::take(targets) {
                if let Some(sources) = self
                    .incoming
                    .get_mut(&old)
                    .and_then(|by_pred| by_pred.get_mut(predicate))
                {
                    sources.remove(&src);
                }
            }
        }
        targets.insert(dst);
        self.incoming
            .entry(dst)
            .or_default()
            .entry(predicate.to_string())
            .or_default()
            .insert(src);
        true
    }

    pub(crate) fn set_schema(&mut self, schema: SchemaDef) {
        self.schema = schema;
        self.reindex();
    }

    fn reindex(&mut self) {
        self.indexes.clear();
        self.unique.clear();
        let records: Vec<NodeRecord> = std::mem::take(&mut self.nodes).into_values().collect();
        self.by_type.clear();
        for record in records {
            self.insert_record(record);
        }
    }

    /// Rebuilds a state from checkpointed nodes and edges.
    pub(crate) fn restore(
        schema: SchemaDef,
        next_id: u64,
        nodes: Vec<NodeRecord>,
        edges: Vec<(NodeId, String, NodeId)>,
    ) -> Self {
        let mut state = GraphState {
            schema,
            next_id,
            ..GraphState::default()
        };
        for record in nodes {
            state.next_id = state.next_id.max(record.id.as_u64());
            state.insert_record(record);
        }
        for (src, predicate, dst) in edges {
            state.add_edge(src, &predicate, dst);
        }
        state
    }

    pub(crate) fn edges(&self) -> impl Iterator<Item = (NodeId, &str, NodeId)> + '_ {
        self.out.iter().flat_map(|(src, by_pred)| {
            by_pred.iter().flat_map(move |(predicate, targets)| {
                targets.iter().map(move |dst| (*src, predicate.as_str(), *dst))
            })
        })
    }

    pub(crate) fn neighbors(adjacency: &Adjacency, id: NodeId, predicate: &str) -> Vec<NodeId> {
        adjacency
            .get(&id)
            .and_then(|by_pred| by_pred.get(predicate))
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }
}

/// Checks a value against the predicate's declared type; ints widen to floats.
fn coerce(def: &PredicateDef, value: &PropertyValue) -> Result<PropertyValue> {
    match (def.ty, value) {
        (ScalarType::Float, PropertyValue::Int(i)) => Ok(PropertyValue::Float(*i as f64)),
        (ty, v) if v.scalar_type() == ty => Ok(v.clone()),
        (ty, v) => Err(StoreError::TypeMismatch {
            predicate: def.name.clone(),
            expected: ty,
            found: v.scalar_type(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medgraph_api::IndexKind;

    fn schema() -> SchemaDef {
        let mut s = SchemaDef::new();
        s.add_predicate(
            PredicateDef::new("doctor_id", ScalarType::String)
                .index(IndexKind::Exact)
                .unique(),
        )
        .unwrap();
        s.add_predicate(PredicateDef::new("weight", ScalarType::Float))
            .unwrap();
        s.add_predicate(PredicateDef::edge("assigned_to").reverse())
            .unwrap();
        s.add_type("DOCTOR", &["doctor_id"]);
        s.add_type("PATIENT", &["weight", "assigned_to"]);
        s
    }

    fn state() -> GraphState {
        let mut st = GraphState::default();
        st.set_schema(schema());
        st
    }

    fn doctor(id: &str) -> NewNode {
        NewNode::new("DOCTOR").with("doctor_id", PropertyValue::String(id.into()))
    }

    #[test]
    fn unique_value_is_reported_as_duplicate() {
        let mut st = state();
        let first = st.apply(Mutation::Create(doctor("D1"))).unwrap();
        let Applied::Created(id) = first else {
            panic!("expected a created node, got {first:?}");
        };
        let again = st.apply(Mutation::Create(doctor("D1"))).unwrap();
        assert_eq!(again, Applied::Duplicate { existing: id });
        assert_eq!(st.nodes.len(), 1);
    }

    #[test]
    fn single_valued_edge_is_replaced() {
        let mut st = state();
        let Applied::Created(d1) = st.apply(Mutation::Create(doctor("D1"))).unwrap() else {
            panic!()
        };
        let Applied::Created(d2) = st.apply(Mutation::Create(doctor("D2"))).unwrap() else {
            panic!()
        };
        let mut patient = NewNode::new("PATIENT");
        patient.link("assigned_to", d1);
        let Applied::Created(p) = st.apply(Mutation::Create(patient)).unwrap() else {
            panic!()
        };
        st.apply(Mutation::Link {
            src: p,
            predicate: "assigned_to".into(),
            dst: d2,
        })
        .unwrap();
        assert_eq!(GraphState::neighbors(&st.out, p, "assigned_to"), vec![d2]);
        assert!(GraphState::neighbors(&st.incoming, d1, "assigned_to").is_empty());
    }

    #[test]
    fn ints_widen_into_float_predicates() {
        let mut st = state();
        let node = NewNode::new("PATIENT").with("weight", PropertyValue::Int(70));
        let Applied::Created(p) = st.apply(Mutation::Create(node)).unwrap() else {
            panic!()
        };
        assert_eq!(
            st.nodes[&p].get("weight"),
            Some(&PropertyValue::Float(70.0))
        );
    }

    #[test]
    fn undeclared_predicate_is_rejected() {
        let mut st = state();
        let node = NewNode::new("DOCTOR").with("weight", PropertyValue::Float(1.0));
        let err = st.apply(Mutation::Create(node)).unwrap_err();
        assert!(matches!(err, StoreError::UndeclaredPredicate { .. }));
    }

    #[test]
    fn dangling_edge_is_rejected() {
        let mut st = state();
        let mut patient = NewNode::new("PATIENT");
        patient.link("assigned_to", NodeId::new(99));
        let err = st.apply(Mutation::Create(patient)).unwrap_err();
        assert!(matches!(err, StoreError::DanglingEdge { .. }));
    }
}
