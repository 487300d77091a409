use crate::catalog;
use crate::checkpoint;
use crate::snapshot::Snapshot;
use crate::state::GraphState;
use medgraph_api::{CommitReport, GraphStore, Mutation, Result, SchemaDef};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

/// Embedded graph store.
///
/// Readers take a [`Snapshot`] of the published state and never block writers.
/// Writers are serialized through `write_lock`; each commit applies its batch to a
/// private copy of the state and publishes the copy only on success.
#[derive(Debug)]
pub struct MemGraph {
    path: Option<PathBuf>,
    published: RwLock<Arc<GraphState>>,
    write_lock: Mutex<()>,
    dirty: AtomicBool,
}

impl MemGraph {
    /// A store without a backing file.
    pub fn in_memory() -> Self {
        Self::with_state(None, GraphState::default())
    }

    /// Opens the store checkpointed at `path`, or an empty one if the file does not
    /// exist yet. The file is written by [`MemGraph::checkpoint`] and on close.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let state = checkpoint::read(&path)?;
            tracing::debug!(
                path = %path.display(),
                nodes = state.nodes.len(),
                "restored checkpoint"
            );
            state
        } else {
            GraphState::default()
        };
        Ok(Self::with_state(Some(path), state))
    }

    fn with_state(path: Option<PathBuf>, state: GraphState) -> Self {
        Self {
            path,
            published: RwLock::new(Arc::new(state)),
            write_lock: Mutex::new(()),
            dirty: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn begin_read(&self) -> Snapshot {
        Snapshot::new(self.current())
    }

    pub fn begin_write(&self) -> WriteTxn<'_> {
        WriteTxn {
            graph: self,
            _guard: self.write_lock.lock().unwrap_or_else(PoisonError::into_inner),
            pending: Vec::new(),
        }
    }

    fn current(&self) -> Arc<GraphState> {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, state: GraphState) {
        *self
            .published
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(state);
        self.dirty.store(true, Ordering::Release);
    }

    /// Writes the published state to the backing file, if any.
    pub fn checkpoint(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let state = self.current();
        checkpoint::write(path, &state)?;
        self.dirty.store(false, Ordering::Release);
        tracing::debug!(path = %path.display(), nodes = state.nodes.len(), "checkpoint written");
        Ok(())
    }

    /// Checkpoints unsaved changes and releases the store.
    ///
    /// A store that saw no commit since it was opened leaves the backing file as it
    /// was, and does not create one.
    pub fn close(self) -> Result<()> {
        if self.dirty.load(Ordering::Acquire) {
            self.checkpoint()?;
        }
        Ok(())
    }
}

impl Drop for MemGraph {
    fn drop(&mut self) {
        if self.dirty.load(Ordering::Acquire) {
            if let Err(e) = self.checkpoint() {
                tracing::warn!(error = %e, "checkpoint on drop failed");
            }
        }
    }
}

impl GraphStore for MemGraph {
    type Snapshot = Snapshot;

    fn alter(&self, schema: &SchemaDef) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.current();
        if let Some(merged) = catalog::merge(&current.schema, schema)? {
            let mut next = GraphState::clone(&current);
            next.set_schema(merged);
            self.publish(next);
            tracing::debug!(predicates = schema.predicates.len(), "schema altered");
        }
        Ok(())
    }

    fn commit(&self, batch: Vec<Mutation>) -> Result<CommitReport> {
        let mut txn = self.begin_write();
        for m in batch {
            txn.push(m);
        }
        txn.commit()
    }

    fn snapshot(&self) -> Snapshot {
        self.begin_read()
    }
}

/// Exclusive write transaction. Nothing is visible until [`WriteTxn::commit`].
pub struct WriteTxn<'a> {
    graph: &'a MemGraph,
    _guard: MutexGuard<'a, ()>,
    pending: Vec<Mutation>,
}

impl WriteTxn<'_> {
    pub fn push(&mut self, mutation: Mutation) {
        self.pending.push(mutation);
    }

    /// Applies all pending mutations. On error the published state is untouched.
    pub fn commit(self) -> Result<CommitReport> {
        if self.pending.is_empty() {
            return Ok(CommitReport::default());
        }
        let mut next = GraphState::clone(&self.graph.current());
        let mut report = CommitReport::default();
        for m in self.pending {
            report.applied.push(next.apply(m)?);
        }
        self.graph.publish(next);
        Ok(report)
    }
}
