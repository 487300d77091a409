//! Embedded store backing medgraph: an indexed in-memory graph with atomic batch
//! commits, copy-on-write snapshots and a JSON checkpoint file.

mod catalog;
mod checkpoint;
pub mod engine;
pub mod index;
pub mod snapshot;
mod state;

pub use engine::{MemGraph, WriteTxn};
pub use snapshot::Snapshot;
pub use state::GraphState;

pub const CHECKPOINT_EXTENSION: &str = "mgraph";
