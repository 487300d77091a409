use medgraph_api::{Result, SchemaDef, StoreError};

/// Merges `incoming` into `current`.
///
/// Returns `Ok(None)` when `incoming` adds nothing, so re-applying a schema is free.
/// A predicate may not change shape once declared; types are replaced wholesale.
pub fn merge(current: &SchemaDef, incoming: &SchemaDef) -> Result<Option<SchemaDef>> {
    incoming.validate()?;

    let mut merged = current.clone();
    for def in incoming.predicates.values() {
        if let Some(existing) = current.predicate(&def.name) {
            if existing != def {
                return Err(StoreError::SchemaConflict {
                    predicate: def.name.clone(),
                    reason: format!(
                        "already declared as `{}`, cannot redeclare as `{}`",
                        existing.render(),
                        def.render()
                    ),
                });
            }
        }
        merged.predicates.insert(def.name.clone(), def.clone());
    }
    for ty in incoming.types.values() {
        merged.types.insert(ty.name.clone(), ty.clone());
    }

    merged.validate()?;
    if merged == *current {
        Ok(None)
    } else {
        Ok(Some(merged))
    }
}
