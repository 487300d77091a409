use crate::NodeId;
use crate::schema::ScalarType;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("checkpoint format error: {0}")]
    Format(String),

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("schema conflict on predicate `{predicate}`: {reason}")]
    SchemaConflict { predicate: String, reason: String },

    #[error("unknown type `{0}`")]
    UnknownType(String),

    #[error("unknown predicate `{0}`")]
    UnknownPredicate(String),

    #[error("predicate `{predicate}` is not declared on type `{type_name}`")]
    UndeclaredPredicate {
        type_name: String,
        predicate: String,
    },

    #[error("predicate `{predicate}` expects {expected:?}, got {found:?}")]
    TypeMismatch {
        predicate: String,
        expected: ScalarType,
        found: ScalarType,
    },

    #[error("predicate `{predicate}` has no {kind} index")]
    MissingIndex {
        predicate: String,
        kind: &'static str,
    },

    #[error("predicate `{0}` is not reverse-indexed")]
    ReverseNotIndexed(String),

    #[error("edge `{predicate}` references missing node {target}")]
    DanglingEdge { predicate: String, target: NodeId },
}
