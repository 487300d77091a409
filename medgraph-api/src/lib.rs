//! Store contract shared by the medgraph loader, query library and store adapters.
//!
//! Anything that can hold typed nodes, resolve edges by opaque identifier and answer
//! exact/term/range predicates with reverse traversal and pagination can back a
//! medgraph load by implementing [`GraphStore`] and [`GraphSnapshot`].

mod error;
mod mutation;
mod query;
mod schema;
mod value;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub use error::{Result, StoreError};
pub use mutation::{Applied, CommitReport, Mutation, NewNode};
pub use query::{Filter, NodeQuery, Order, Page, RootFunc, sort_records, terms};
pub use schema::{IndexKind, PredicateDef, ScalarType, SchemaDef, TypeDef};
pub use value::{PropertyValue, parse_datetime};

/// Store-assigned node identifier.
///
/// Opaque to callers; rendered as `0x..` hex the way graph stores usually print uids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(u64);

impl NodeId {
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        u64::from_str_radix(digits, 16).map(NodeId)
    }
}

/// A committed node: its type, identifier and scalar properties.
///
/// Edges are not part of the record; use [`GraphSnapshot::out`] and
/// [`GraphSnapshot::reverse`] to traverse them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub type_name: String,
    pub properties: BTreeMap<String, PropertyValue>,
}

impl NodeRecord {
    #[inline]
    pub fn get(&self, field: &str) -> Option<&PropertyValue> {
        self.properties.get(field)
    }
}

/// Write side of a graph store.
///
/// Implementors must apply each [`GraphStore::commit`] batch atomically: either every
/// mutation in the batch becomes visible to later snapshots, or none does.
pub trait GraphStore {
    type Snapshot: GraphSnapshot;

    /// Applies a schema definition.
    ///
    /// Re-applying an identical definition must succeed without side effects.
    fn alter(&self, schema: &SchemaDef) -> Result<()>;

    /// Commits a batch of mutations as one request.
    fn commit(&self, batch: Vec<Mutation>) -> Result<CommitReport>;

    /// Creates a read-only view of the committed graph.
    ///
    /// The snapshot is independent of commits that happen after its creation.
    fn snapshot(&self) -> Self::Snapshot;
}

/// A read-only, consistent view of the committed graph.
pub trait GraphSnapshot {
    /// The schema in effect when the snapshot was taken.
    fn schema(&self) -> &SchemaDef;

    /// Looks up a node by identifier.
    fn node(&self, id: NodeId) -> Option<&NodeRecord>;

    /// Evaluates a root function, filter, ordering and pagination.
    ///
    /// Without an [`Order`], results are in ascending [`NodeId`] order.
    fn find(&self, query: &NodeQuery) -> Result<Vec<NodeId>>;

    /// Targets of the outgoing `predicate` edges of `src`, in ascending id order.
    fn out(&self, src: NodeId, predicate: &str) -> Vec<NodeId>;

    /// Sources of the incoming `predicate` edges of `dst`, in ascending id order.
    ///
    /// Fails with [`StoreError::ReverseNotIndexed`] when the predicate was not declared
    /// with `@reverse`.
    fn reverse(&self, dst: NodeId, predicate: &str) -> Result<Vec<NodeId>>;

    /// Number of incoming `predicate` edges of `dst`.
    fn count_reverse(&self, dst: NodeId, predicate: &str) -> Result<u64> {
        Ok(self.reverse(dst, predicate)?.len() as u64)
    }

    /// Number of nodes, optionally restricted to one type.
    fn node_count(&self, type_name: Option<&str>) -> u64;

    /// Number of edges, optionally restricted to one predicate.
    fn edge_count(&self, predicate: Option<&str>) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_round_trips_through_hex() {
        let id = NodeId::new(0x2a);
        assert_eq!(id.to_string(), "0x2a");
        assert_eq!("0x2a".parse::<NodeId>().unwrap(), id);
        assert_eq!("2a".parse::<NodeId>().unwrap(), id);
        assert!("0xzz".parse::<NodeId>().is_err());
    }
}
