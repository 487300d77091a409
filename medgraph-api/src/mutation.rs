use crate::NodeId;
use crate::value::PropertyValue;
use std::collections::BTreeMap;

/// A node to be created, possibly with outgoing edges to already committed nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNode {
    pub type_name: String,
    pub scalars: BTreeMap<String, PropertyValue>,
    pub edges: Vec<(String, NodeId)>,
}

impl NewNode {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            scalars: BTreeMap::new(),
            edges: Vec::new(),
        }
    }

    pub fn set(&mut self, predicate: impl Into<String>, value: PropertyValue) {
        self.scalars.insert(predicate.into(), value);
    }

    pub fn with(mut self, predicate: impl Into<String>, value: PropertyValue) -> Self {
        self.set(predicate, value);
        self
    }

    /// Adds an edge to an already committed node.
    pub fn link(&mut self, predicate: impl Into<String>, target: NodeId) {
        self.edges.push((predicate.into(), target));
    }
}

/// One entry of a commit batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Create a top-level node.
    Create(NewNode),
    /// Add an edge between two committed nodes.
    Link {
        src: NodeId,
        predicate: String,
        dst: NodeId,
    },
    /// Create a node owned by a committed node, connected by `predicate`.
    Attach {
        owner: NodeId,
        predicate: String,
        node: NewNode,
    },
}

/// Outcome of a single mutation within a committed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// A node was created (the top-level node for `Create`, the child for `Attach`).
    Created(NodeId),
    /// The node carried a unique value already held by `existing`; nothing was written.
    Duplicate { existing: NodeId },
    /// An edge was written; `new_edge` is false when it already existed.
    Linked { new_edge: bool },
}

/// Per-mutation outcomes of a batch, in batch order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub applied: Vec<Applied>,
}

impl CommitReport {
    pub fn created(&self) -> usize {
        self.applied
            .iter()
            .filter(|a| matches!(a, Applied::Created(_)))
            .count()
    }

    pub fn duplicates(&self) -> usize {
        self.applied
            .iter()
            .filter(|a| matches!(a, Applied::Duplicate { .. }))
            .count()
    }

    pub fn new_edges(&self) -> usize {
        self.applied
            .iter()
            .filter(|a| matches!(a, Applied::Linked { new_edge: true }))
            .count()
    }
}
