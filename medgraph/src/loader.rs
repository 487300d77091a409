//! Dependency-ordered loader.
//!
//! For each entity kind in the plan: read and coerce rows, resolve every referenced
//! natural key in one round, build mutations with the resolved edges, commit them in
//! bounded batches, then run a discovery pass so the next kind can reference the new
//! nodes.

use crate::error::{LoadError, Result, UnresolvedReference};
use crate::record::{EntityKind, KeyRef, NodeType, Planned, Record};
use crate::resolver::Resolver;
use crate::source::RecordSource;
use medgraph_api::{Applied, GraphStore, Mutation};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub const DEFAULT_BATCH_SIZE: usize = 25;

/// Order in which entity kinds are loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadPlan {
    kinds: Vec<EntityKind>,
}

impl LoadPlan {
    /// Catalogs, then the entities referencing them, then relationship rows.
    pub fn standard() -> Self {
        Self {
            kinds: EntityKind::ALL.to_vec(),
        }
    }

    /// A custom order. Nothing is reordered; see [`LoadPlan::violations`].
    pub fn new(kinds: impl IntoIterator<Item = EntityKind>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
        }
    }

    pub fn kinds(&self) -> &[EntityKind] {
        &self.kinds
    }

    /// `(kind, dependency)` pairs where the dependency is scheduled after the kind.
    pub fn violations(&self) -> Vec<(EntityKind, EntityKind)> {
        let mut out = Vec::new();
        for (i, kind) in self.kinds.iter().enumerate() {
            for dep in kind.depends_on() {
                if self.kinds[i + 1..].contains(dep) {
                    out.push((*kind, *dep));
                }
            }
        }
        out
    }
}

impl Default for LoadPlan {
    fn default() -> Self {
        Self::standard()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    pub batch_size: usize,
    pub plan: LoadPlan,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            plan: LoadPlan::standard(),
        }
    }
}

impl LoadOptions {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_plan(mut self, plan: LoadPlan) -> Self {
        self.plan = plan;
        self
    }
}

/// Counters for one entity kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySummary {
    pub entity: EntityKind,
    /// Rows returned by the source, including malformed ones.
    pub read: usize,
    /// Rows dropped as malformed or missing their key.
    pub skipped: usize,
    pub created: usize,
    /// Creates rejected because the natural key already existed.
    pub duplicates: usize,
    /// New edges written by relationship rows.
    pub linked: usize,
    /// Edges (or owned rows) left out because a key did not resolve.
    pub unresolved: usize,
    pub batches: usize,
}

impl EntitySummary {
    fn new(entity: EntityKind) -> Self {
        Self {
            entity,
            read: 0,
            skipped: 0,
            created: 0,
            duplicates: 0,
            linked: 0,
            unresolved: 0,
            batches: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub entities: Vec<EntitySummary>,
}

impl LoadSummary {
    pub fn get(&self, entity: EntityKind) -> Option<&EntitySummary> {
        self.entities.iter().find(|e| e.entity == entity)
    }

    pub fn created(&self) -> usize {
        self.entities.iter().map(|e| e.created).sum()
    }

    pub fn duplicates(&self) -> usize {
        self.entities.iter().map(|e| e.duplicates).sum()
    }
}

impl fmt::Display for LoadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<20} {:>7} {:>7} {:>7} {:>7} {:>7} {:>10} {:>7}",
            "entity", "read", "skipped", "created", "dup", "linked", "unresolved", "batches"
        )?;
        for e in &self.entities {
            writeln!(
                f,
                "{:<20} {:>7} {:>7} {:>7} {:>7} {:>7} {:>10} {:>7}",
                e.entity.name(),
                e.read,
                e.skipped,
                e.created,
                e.duplicates,
                e.linked,
                e.unresolved,
                e.batches
            )?;
        }
        Ok(())
    }
}

/// Drives a load against `store`, keeping `resolver` current.
pub struct Loader<'a, S: GraphStore> {
    store: &'a S,
    resolver: &'a mut Resolver,
    options: LoadOptions,
}

impl<'a, S: GraphStore> Loader<'a, S> {
    pub fn new(store: &'a S, resolver: &'a mut Resolver) -> Self {
        Self {
            store,
            resolver,
            options: LoadOptions::default(),
        }
    }

    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    /// Loads every kind of the configured plan, in order.
    ///
    /// Stops at the first [`LoadError`]; kinds committed before it stay committed.
    pub fn load(&mut self, source: &impl RecordSource) -> Result<LoadSummary> {
        for (kind, dep) in self.options.plan.violations() {
            tracing::warn!(
                entity = %kind,
                dependency = %dep,
                "plan loads an entity before its dependency; its references will not resolve"
            );
        }
        let mut summary = LoadSummary::default();
        for kind in self.options.plan.kinds().to_vec() {
            let s = self.load_entity(source, kind)?;
            tracing::info!(
                entity = %kind,
                read = s.read,
                created = s.created,
                linked = s.linked,
                skipped = s.skipped,
                duplicates = s.duplicates,
                unresolved = s.unresolved,
                "entity loaded"
            );
            summary.entities.push(s);
        }
        Ok(summary)
    }

    pub fn load_entity(
        &mut self,
        source: &impl RecordSource,
        kind: EntityKind,
    ) -> Result<EntitySummary> {
        let mut summary = EntitySummary::new(kind);

        let mut planned = Vec::new();
        for row in source.records(kind)? {
            summary.read += 1;
            let coerced =
                row.and_then(|raw| Record::coerce(kind, &raw).map(|r| (raw.line, r.plan())));
            match coerced {
                Ok(p) => planned.push(p),
                Err(e) => {
                    summary.skipped += 1;
                    tracing::warn!(entity = %kind, line = e.line, reason = %e.reason, "skipping record");
                }
            }
        }

        self.resolve_references(&planned)?;
        let mutations = self.build_mutations(kind, planned, &mut summary);
        let committed_keys = self.commit_batches(kind, mutations, &mut summary)?;

        if let Some(node_type) = kind.node_type().filter(|t| t.natural_key().is_some()) {
            let snapshot = self.store.snapshot();
            self.resolver.discover(
                &snapshot,
                node_type,
                committed_keys.iter().map(String::as_str),
            )?;
        }
        Ok(summary)
    }

    /// Resolves every referenced key of the batch set, one store query per distinct key.
    fn resolve_references<'p>(&mut self, planned: &'p [(u64, Planned)]) -> Result<()> {
        let mut wanted: BTreeMap<NodeType, BTreeSet<&'p str>> = BTreeMap::new();
        let mut want = |k: &'p KeyRef| {
            wanted.entry(k.node_type).or_default().insert(k.key.as_str());
        };
        for (_, p) in planned {
            match p {
                Planned::Create { references, .. } => {
                    references.iter().for_each(|r| want(&r.target));
                }
                Planned::Attach { owner, .. } => want(&owner.target),
                Planned::Link { source, target, .. } => {
                    want(source);
                    want(target);
                }
            }
        }
        if wanted.is_empty() {
            return Ok(());
        }
        let snapshot = self.store.snapshot();
        for (node_type, keys) in wanted {
            self.resolver.resolve_many(&snapshot, node_type, keys)?;
        }
        Ok(())
    }

    fn build_mutations(
        &self,
        kind: EntityKind,
        planned: Vec<(u64, Planned)>,
        summary: &mut EntitySummary,
    ) -> Vec<(Option<KeyRef>, Mutation)> {
        let mut omit = |line: u64, predicate: &'static str, target: &KeyRef| {
            summary.unresolved += 1;
            let warning = UnresolvedReference {
                entity: kind,
                line,
                predicate,
                target: target.node_type,
                key: target.key.clone(),
            };
            tracing::warn!(%warning, "omitting unresolved reference");
        };

        let mut out = Vec::with_capacity(planned.len());
        for (line, p) in planned {
            match p {
                Planned::Create {
                    key,
                    mut node,
                    references,
                } => {
                    for r in references {
                        match self.resolver.lookup(r.target.node_type, &r.target.key) {
                            Some(id) => node.link(r.predicate, id),
                            None => omit(line, r.predicate, &r.target),
                        }
                    }
                    out.push((Some(key), Mutation::Create(node)));
                }
                Planned::Attach { owner, node } => {
                    match self.resolver.lookup(owner.target.node_type, &owner.target.key) {
                        Some(id) => out.push((
                            None,
                            Mutation::Attach {
                                owner: id,
                                predicate: owner.predicate.to_string(),
                                node,
                            },
                        )),
                        None => omit(line, owner.predicate, &owner.target),
                    }
                }
                Planned::Link {
                    source,
                    predicate,
                    target,
                } => {
                    let src = self.resolver.lookup(source.node_type, &source.key);
                    let dst = self.resolver.lookup(target.node_type, &target.key);
                    match (src, dst) {
                        (Some(src), Some(dst)) => out.push((
                            None,
                            Mutation::Link {
                                src,
                                predicate: predicate.to_string(),
                                dst,
                            },
                        )),
                        (src, _) => {
                            let missing = if src.is_none() { &source } else { &target };
                            omit(line, predicate, missing);
                        }
                    }
                }
            }
        }
        out
    }

    /// Commits `mutations` in order, `batch_size` at a time. Returns the natural keys
    /// of the nodes created or found to exist already.
    fn commit_batches(
        &mut self,
        kind: EntityKind,
        mutations: Vec<(Option<KeyRef>, Mutation)>,
        summary: &mut EntitySummary,
    ) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for (batch_index, batch) in mutations.chunks(self.options.batch_size).enumerate() {
            let (batch_keys, batch): (Vec<_>, Vec<_>) = batch.iter().cloned().unzip();
            let size = batch.len();
            let report = self.store.commit(batch).map_err(|cause| LoadError {
                entity: kind,
                batch_index,
                cause,
            })?;
            summary.batches += 1;

            for (key, applied) in batch_keys.into_iter().zip(report.applied) {
                match applied {
                    Applied::Created(id) => {
                        summary.created += 1;
                        if let Some(k) = key {
                            self.resolver.register(k.node_type, &k.key, id)?;
                            keys.push(k.key);
                        }
                    }
                    Applied::Duplicate { existing } => {
                        summary.duplicates += 1;
                        match key {
                            Some(k) => {
                                tracing::warn!(
                                    entity = %kind,
                                    key = %k.key,
                                    existing = %existing,
                                    "natural key already loaded, keeping existing node"
                                );
                                self.resolver.register(k.node_type, &k.key, existing)?;
                                keys.push(k.key);
                            }
                            None => {
                                tracing::debug!(entity = %kind, existing = %existing, "owned row already loaded");
                            }
                        }
                    }
                    Applied::Linked { new_edge } => {
                        if new_edge {
                            summary.linked += 1;
                        }
                    }
                }
            }
            tracing::debug!(entity = %kind, batch = batch_index, size, "batch committed");
        }
        Ok(keys)
    }
}
