use crate::state::GraphState;
use medgraph_api::{
    GraphSnapshot, IndexKind, NodeId, NodeQuery, NodeRecord, PredicateDef, PropertyValue, Result,
    RootFunc, ScalarType, SchemaDef, StoreError, sort_records,
};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Read view over one published [`GraphState`].
#[derive(Debug, Clone)]
pub struct Snapshot {
    state: Arc<GraphState>,
}

impl Snapshot {
    pub(crate) fn new(state: Arc<GraphState>) -> Self {
        Self { state }
    }

    fn indexed(&self, field: &str, kind: &'static str) -> Result<&PredicateDef> {
        let def = self
            .state
            .schema
            .predicate(field)
            .ok_or_else(|| StoreError::UnknownPredicate(field.to_string()))?;
        let present = match kind {
            "term" => def.has_index(IndexKind::Term),
            _ => def.ordered_index().is_some(),
        };
        if !present {
            return Err(StoreError::MissingIndex {
                predicate: field.to_string(),
                kind,
            });
        }
        Ok(def)
    }

    fn candidates(&self, root: &RootFunc) -> Result<BTreeSet<NodeId>> {
        let idx = &self.state.indexes;
        Ok(match root {
            RootFunc::Type(t) => self.state.by_type.get(t).cloned().unwrap_or_default(),
            RootFunc::Uids(ids) => ids
                .iter()
                .copied()
                .filter(|id| self.state.nodes.contains_key(id))
                .collect(),
            RootFunc::Eq { field, value } => {
                let def = self.indexed(field, "exact")?;
                idx.lookup_eq(field, &key_value(def, value)?)
            }
            RootFunc::AnyOfTerms { field, text } => {
                self.indexed(field, "term")?;
                idx.lookup_any_term(field, text)
            }
            RootFunc::Ge { field, value } => {
                let def = self.indexed(field, "ordered")?;
                idx.lookup_range(field, Some(&key_value(def, value)?), None)
            }
            RootFunc::Le { field, value } => {
                let def = self.indexed(field, "ordered")?;
                idx.lookup_range(field, None, Some(&key_value(def, value)?))
            }
            RootFunc::Between { field, low, high } => {
                let def = self.indexed(field, "ordered")?;
                idx.lookup_range(
                    field,
                    Some(&key_value(def, low)?),
                    Some(&key_value(def, high)?),
                )
            }
        })
    }
}

/// Brings a query value to the key type of the predicate's index.
fn key_value(def: &PredicateDef, value: &PropertyValue) -> Result<PropertyValue> {
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

impl GraphSnapshot for Snapshot {
    fn schema(&self) -> &SchemaDef {
        &self.state.schema
    }

    fn node(&self, id: NodeId) -> Option<&NodeRecord> {
        self.state.nodes.get(&id)
    }

    fn find(&self, query: &NodeQuery) -> Result<Vec<NodeId>> {
        let ids = self.candidates(&query.root)?;
        let mut records: Vec<&NodeRecord> = ids
            .iter()
            .filter_map(|id| self.state.nodes.get(id))
            .filter(|r| query.filter.as_ref().is_none_or(|f| f.matches(r)))
            .collect();
        if let Some(order) = &query.order {
            sort_records(&mut records, order);
        }
        Ok(query.page.apply(records.into_iter().map(|r| r.id).collect()))
    }

    fn out(&self, src: NodeId, predicate: &str) -> Vec<NodeId> {
        GraphState::neighbors(&self.state.out, src, predicate)
    }

    fn reverse(&self, dst: NodeId, predicate: &str) -> Result<Vec<NodeId>> {
        match self.state.schema.predicate(predicate) {
            Some(def) if def.reverse => {
                Ok(GraphState::neighbors(&self.state.incoming, dst, predicate))
            }
            Some(_) => Err(StoreError::ReverseNotIndexed(predicate.to_string())),
            None => Err(StoreError::UnknownPredicate(predicate.to_string())),
        }
    }

    fn node_count(&self, type_name: Option<&str>) -> u64 {
        match type_name {
            Some(t) => self.state.by_type.get(t).map_or(0, |ids| ids.len() as u64),
            None => self.state.nodes.len() as u64,
        }
    }

    fn edge_count(&self, predicate: Option<&str>) -> u64 {
        self.state
            .edges()
            .filter(|(_, p, _)| predicate.is_none_or(|want| want == *p))
            .count() as u64
    }
}
