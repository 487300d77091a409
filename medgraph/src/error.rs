use crate::record::{EntityKind, NodeType};
use medgraph_api::{NodeId, StoreError};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error of the medgraph library.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    DuplicateKey(#[from] DuplicateKeyError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("type `{0}` is already declared")]
    DuplicateType(String),

    #[error("invalid schema: {0}")]
    Invalid(#[source] StoreError),

    #[error("store rejected the schema: {0}")]
    Rejected(#[source] StoreError),
}

/// A record source could not be read at all.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{}: missing column `{column}`", path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("{}: unreadable header: {source}", path.display())]
    Header {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Two different store identifiers claimed the same natural key.
#[derive(Debug, Error)]
#[error("natural key `{key}` of {node_type} maps to both {existing} and {conflicting}")]
pub struct DuplicateKeyError {
    pub node_type: NodeType,
    pub key: String,
    pub existing: NodeId,
    pub conflicting: NodeId,
}

/// A batch commit failed; later batches of the same entity kind were not attempted.
#[derive(Debug, Error)]
#[error("loading {entity} failed at batch {batch_index}: {cause}")]
pub struct LoadError {
    pub entity: EntityKind,
    pub batch_index: usize,
    #[source]
    pub cause: StoreError,
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("unknown query `{0}`")]
    UnknownQuery(String),

    #[error("query `{query}` requires parameter `{param}`")]
    MissingParam { query: &'static str, param: &'static str },

    #[error("parameter `{param}`: {reason}")]
    InvalidParam { param: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl QueryError {
    pub(crate) fn invalid(param: &str, reason: impl Into<String>) -> Self {
        QueryError::InvalidParam {
            param: param.to_string(),
            reason: reason.into(),
        }
    }
}

/// Why a source row was skipped. Recoverable: the row is logged and counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecordError {
    pub entity: EntityKind,
    pub line: u64,
    pub reason: String,
}

impl fmt::Display for SourceRecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} line {}: {}", self.entity, self.line, self.reason)
    }
}

/// An edge left out because its target key did not resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedReference {
    pub entity: EntityKind,
    pub line: u64,
    pub predicate: &'static str,
    pub target: NodeType,
    pub key: String,
}

impl fmt::Display for UnresolvedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} line {}: `{}` -> {} `{}` not found",
            self.entity, self.line, self.predicate, self.target, self.key
        )
    }
}
