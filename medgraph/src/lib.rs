//! # medgraph
//!
//! Loads hospital records (doctors, patients, diagnoses, medications, treatments,
//! vital-sign readings, visitors and the relationships between them) from CSV files
//! into a typed graph store, and answers a fixed catalog of parameterized queries.
//!
//! ## Quickstart
//!
//! ```rust,no_run
//! use medgraph::{CsvSource, Loader, MemGraph, QueryLibrary, Resolver, SchemaRegistry};
//! use medgraph::GraphStore;
//!
//! fn main() -> medgraph::Result<()> {
//!     let store = MemGraph::open("hospital.mgraph")?;
//!     SchemaRegistry::hospital()?.apply(&store)?;
//!
//!     let mut resolver = Resolver::new();
//!     let summary = Loader::new(&store, &mut resolver).load(&CsvSource::new("data"))?;
//!     println!("{summary}");
//!
//!     let snapshot = store.snapshot();
//!     let rows = QueryLibrary::new(&snapshot).patient_medications("P001")?;
//!     println!("{}", serde_json::to_string(&rows).unwrap_or_default());
//!     store.close()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Core Concepts
//!
//! - **[`SchemaRegistry`]**: node types, fields and index directives. Applied once per
//!   store before any data.
//! - **[`RecordSource`]**: rows per [`EntityKind`]; [`CsvSource`] reads one file per kind.
//! - **[`Resolver`]**: natural key to [`NodeId`] cache shared by the loader and queries.
//! - **[`Loader`]**: commits each entity kind in dependency order, in bounded batches.
//! - **[`query`]**: the query catalog, as typed methods on [`QueryLibrary`] or by name
//!   through [`prepare`].
//!
//! Any [`GraphStore`] can back the pipeline; [`MemGraph`] is the embedded one.

mod error;
pub mod loader;
pub mod query;
pub mod record;
pub mod resolver;
pub mod schema;
pub mod source;

pub use error::{
    DuplicateKeyError, Error, LoadError, QueryError, Result, SchemaError, SourceError,
    SourceRecordError, UnresolvedReference,
};
pub use loader::{
    DEFAULT_BATCH_SIZE, EntitySummary, LoadOptions, LoadPlan, LoadSummary, Loader,
};
pub use medgraph_api::{
    GraphSnapshot, GraphStore, NodeId, NodeRecord, PropertyValue, SchemaDef, StoreError,
};
pub use medgraph_storage::{CHECKPOINT_EXTENSION, MemGraph};
pub use query::{PAGE_SIZE, Params, QueryLibrary, Row, Value, prepare};
pub use record::{EntityKind, NodeType, RawRecord, Record};
pub use resolver::Resolver;
pub use schema::SchemaRegistry;
pub use source::{CsvSource, MemorySource, RecordSource};
