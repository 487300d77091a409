use medgraph_api::{IndexKind, NodeId, PredicateDef, PropertyValue, terms};
use ordered_float::OrderedFloat;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;

/// Totally ordered, hashable form of a [`PropertyValue`] used as an index key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexKey {
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    Time(i64),
    Str(String),
}

impl IndexKey {
    pub fn of(value: &PropertyValue) -> Self {
        match value {
            PropertyValue::Bool(b) => IndexKey::Bool(*b),
            PropertyValue::Int(i) => IndexKey::Int(*i),
            PropertyValue::Float(f) => IndexKey::Float(OrderedFloat(*f)),
            PropertyValue::DateTime(t) => IndexKey::Time(t.timestamp_micros()),
            PropertyValue::String(s) => IndexKey::Str(s.clone()),
        }
    }
}

/// Secondary indexes for every indexed scalar predicate.
#[derive(Debug, Clone, Default)]
pub struct IndexSet {
    // exact / int / float / day tokenizers share one ordered map per predicate
    ordered: HashMap<String, BTreeMap<IndexKey, BTreeSet<NodeId>>>,
    terms: HashMap<String, HashMap<String, BTreeSet<NodeId>>>,
}

impl IndexSet {
    pub fn insert(&mut self, def: &PredicateDef, id: NodeId, value: &PropertyValue) {
        if def.ordered_index().is_some() {
            self.ordered
                .entry(def.name.clone())
                .or_default()
                .entry(IndexKey::of(value))
                .or_default()
                .insert(id);
        }
        if def.has_index(IndexKind::Term) {
            if let Some(text) = value.as_str() {
                let postings = self.terms.entry(def.name.clone()).or_default();
                for term in terms(text) {
                    postings.entry(term).or_default().insert(id);
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.ordered.clear();
        self.terms.clear();
    }

    pub fn lookup_eq(&self, predicate: &str, value: &PropertyValue) -> BTreeSet<NodeId> {
        self.ordered
            .get(predicate)
            .and_then(|m| m.get(&IndexKey::of(value)))
            .cloned()
            .unwrap_or_default()
    }

    pub fn lookup_range(
        &self,
        predicate: &str,
        low: Option<&PropertyValue>,
        high: Option<&PropertyValue>,
    ) -> BTreeSet<NodeId> {
        let Some(map) = self.ordered.get(predicate) else {
            return BTreeSet::new();
        };
        let low = low.map_or(Bound::Unbounded, |v| Bound::Included(IndexKey::of(v)));
        let high = high.map_or(Bound::Unbounded, |v| Bound::Included(IndexKey::of(v)));
        if let (Bound::Included(l), Bound::Included(h)) = (&low, &high) {
            if l > h {
                return BTreeSet::new();
            }
        }
        map.range((low, high))
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect()
    }

    /// Nodes whose `predicate` shares at least one term with `text`.
    pub fn lookup_any_term(&self, predicate: &str, text: &str) -> BTreeSet<NodeId> {
        let Some(postings) = self.terms.get(predicate) else {
            return BTreeSet::new();
        };
        terms(text)
            .iter()
            .filter_map(|t| postings.get(t))
            .flat_map(|ids| ids.iter().copied())
            .collect()
    }
}
