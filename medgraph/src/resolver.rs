use crate::error::{DuplicateKeyError, Error, Result};
use crate::record::NodeType;
use medgraph_api::{GraphSnapshot, NodeId, NodeQuery, PropertyValue};
use std::collections::{BTreeSet, HashMap};

/// Natural key to store identifier cache.
///
/// Filled after each commit and by explicit discovery against the store. A key is
/// bound to one identifier for the lifetime of the resolver; misses are not cached
/// because a later entity kind may still create the key.
#[derive(Debug, Default)]
pub struct Resolver {
    ids: HashMap<(NodeType, String), NodeId>,
    store_lookups: u64,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `key` to `id`. Re-registering the same pair is a no-op.
    pub fn register(
        &mut self,
        node_type: NodeType,
        key: &str,
        id: NodeId,
    ) -> std::result::Result<(), DuplicateKeyError> {
        match self.ids.get(&(node_type, key.to_string())) {
            Some(&existing) if existing != id => Err(DuplicateKeyError {
                node_type,
                key: key.to_string(),
                existing,
                conflicting: id,
            }),
            Some(_) => Ok(()),
            None => {
                self.ids.insert((node_type, key.to_string()), id);
                Ok(())
            }
        }
    }

    /// In-process lookup only.
    pub fn lookup(&self, node_type: NodeType, key: &str) -> Option<NodeId> {
        self.ids.get(&(node_type, key.to_string())).copied()
    }

    /// Resolves one key, asking the store on a miss.
    pub fn resolve<S: GraphSnapshot>(
        &mut self,
        snapshot: &S,
        node_type: NodeType,
        key: &str,
    ) -> Result<Option<NodeId>> {
        if let Some(id) = self.lookup(node_type, key) {
            return Ok(Some(id));
        }
        let found = self.query_store(snapshot, node_type, key)?;
        if let Some(id) = found {
            self.register(node_type, key, id)?;
        }
        Ok(found)
    }

    /// Resolves a whole key set: one store query per distinct key not already known.
    pub fn resolve_many<'k, S: GraphSnapshot>(
        &mut self,
        snapshot: &S,
        node_type: NodeType,
        keys: impl IntoIterator<Item = &'k str>,
    ) -> Result<usize> {
        let missing: BTreeSet<&str> = keys
            .into_iter()
            .filter(|k| self.lookup(node_type, k).is_none())
            .collect();
        let mut found = 0;
        for key in missing {
            if let Some(id) = self.query_store(snapshot, node_type, key)? {
                self.register(node_type, key, id)?;
                found += 1;
            }
        }
        Ok(found)
    }

    /// Asks the store for every distinct key, known or not, and registers the answers.
    ///
    /// Run after an entity kind is committed; a store answer that disagrees with an
    /// earlier registration is a [`DuplicateKeyError`].
    pub fn discover<'k, S: GraphSnapshot>(
        &mut self,
        snapshot: &S,
        node_type: NodeType,
        keys: impl IntoIterator<Item = &'k str>,
    ) -> Result<usize> {
        let distinct: BTreeSet<&str> = keys.into_iter().collect();
        let mut found = 0;
        for key in distinct {
            if let Some(id) = self.query_store(snapshot, node_type, key)? {
                self.register(node_type, key, id)?;
                found += 1;
            }
        }
        Ok(found)
    }

    fn query_store<S: GraphSnapshot>(
        &mut self,
        snapshot: &S,
        node_type: NodeType,
        key: &str,
    ) -> Result<Option<NodeId>> {
        let Some(field) = node_type.natural_key() else {
            return Ok(None);
        };
        self.store_lookups += 1;
        let hits = snapshot.find(&NodeQuery::eq(
            node_type.type_name(),
            field,
            PropertyValue::String(key.to_string()),
        ))?;
        tracing::debug!(%node_type, key, hits = hits.len(), "resolver store lookup");
        match hits.as_slice() {
            [] => Ok(None),
            [id] => Ok(Some(*id)),
            [first, second, ..] => Err(Error::DuplicateKey(DuplicateKeyError {
                node_type,
                key: key.to_string(),
                existing: *first,
                conflicting: *second,
            })),
        }
    }

    /// Number of keys currently bound.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Total store queries issued so far.
    pub fn store_lookups(&self) -> u64 {
        self.store_lookups
    }
}
