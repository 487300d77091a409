//! JSON checkpoint of a whole [`GraphState`].
//!
//! The file is rewritten in full on every checkpoint: the new contents go to a
//! sibling temp file which then replaces the old one with a rename.

use crate::state::GraphState;
use medgraph_api::{NodeId, NodeRecord, Result, SchemaDef, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

const FORMAT: &str = "medgraph-checkpoint/1";

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointFile {
    format: String,
    next_id: u64,
    schema: SchemaDef,
    nodes: Vec<NodeRecord>,
    edges: Vec<(NodeId, String, NodeId)>,
}

pub fn write(path: &Path, state: &GraphState) -> Result<()> {
    let mut edges: Vec<(NodeId, String, NodeId)> = state
        .edges()
        .map(|(src, p, dst)| (src, p.to_string(), dst))
        .collect();
    edges.sort();
    let file = CheckpointFile {
        format: FORMAT.to_string(),
        next_id: state.next_id(),
        schema: state.schema.clone(),
        nodes: state.nodes.values().cloned().collect(),
        edges,
    };

    let tmp_path = path.with_extension(format!("tmp.{}", std::process::id()));
    let mut out = BufWriter::new(File::create(&tmp_path)?);
    serde_json::to_writer(&mut out, &file).map_err(|e| StoreError::Format(e.to_string()))?;
    out.flush()?;
    out.get_ref().sync_all()?;
    drop(out);

    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(StoreError::Io(e));
    }
    Ok(())
}

pub fn read(path: &Path) -> Result<GraphState> {
    let reader = BufReader::new(File::open(path)?);
    let file: CheckpointFile =
        serde_json::from_reader(reader).map_err(|e| StoreError::Format(e.to_string()))?;
    if file.format != FORMAT {
        return Err(StoreError::Format(format!(
            "unsupported checkpoint format `{}`",
            file.format
        )));
    }
    file.schema.validate()?;
    let ids: HashSet<NodeId> = file.nodes.iter().map(|n| n.id).collect();
    for (src, predicate, dst) in &file.edges {
        for end in [src, dst] {
            if !ids.contains(end) {
                return Err(StoreError::DanglingEdge {
                    predicate: predicate.clone(),
                    target: *end,
                });
            }
        }
    }
    Ok(GraphState::restore(
        file.schema,
        file.next_id,
        file.nodes,
        file.edges,
    ))
}
