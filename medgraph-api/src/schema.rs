use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

/// Value type of a predicate. `Uid` predicates are edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    String,
    Int,
    Float,
    Bool,
    DateTime,
    Uid,
}

impl ScalarType {
    pub fn keyword(self) -> &'static str {
        match self {
            ScalarType::String => "string",
            ScalarType::Int => "int",
            ScalarType::Float => "float",
            ScalarType::Bool => "bool",
            ScalarType::DateTime => "datetime",
            ScalarType::Uid => "uid",
        }
    }
}

/// Index tokenizer declared on a scalar predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Whole-value equality (and ordering on strings).
    Exact,
    /// Lowercased word terms.
    Term,
    Int,
    Float,
    /// Datetime ordering at day granularity or finer.
    Day,
}

impl IndexKind {
    pub fn keyword(self) -> &'static str {
        match self {
            IndexKind::Exact => "exact",
            IndexKind::Term => "term",
            IndexKind::Int => "int",
            IndexKind::Float => "float",
            IndexKind::Day => "day",
        }
    }

    /// Whether this tokenizer can be declared on a predicate of type `ty`.
    pub fn supports(self, ty: ScalarType) -> bool {
        matches!(
            (self, ty),
            (IndexKind::Exact | IndexKind::Term, ScalarType::String)
                | (IndexKind::Int, ScalarType::Int)
                | (IndexKind::Float, ScalarType::Float)
                | (IndexKind::Day, ScalarType::DateTime)
        )
    }

    /// Whether the index keeps values in order, so it can answer range functions.
    pub fn is_ordered(self) -> bool {
        !matches!(self, IndexKind::Term)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateDef {
    pub name: String,
    pub ty: ScalarType,
    #[serde(default)]
    pub indexes: BTreeSet<IndexKind>,
    #[serde(default)]
    pub reverse: bool,
    #[serde(default)]
    pub count: bool,
    #[serde(default)]
    pub unique: bool,
    /// Edge predicates only: holds many targets instead of one.
    #[serde(default)]
    pub list: bool,
}

impl PredicateDef {
    pub fn new(name: impl Into<String>, ty: ScalarType) -> Self {
        Self {
            name: name.into(),
            ty,
            indexes: BTreeSet::new(),
            reverse: false,
            count: false,
            unique: false,
            list: false,
        }
    }

    pub fn edge(name: impl Into<String>) -> Self {
        Self::new(name, ScalarType::Uid)
    }

    pub fn index(mut self, kind: IndexKind) -> Self {
        self.indexes.insert(kind);
        self
    }

    pub fn reverse(mut self) -> Self {
        self.reverse = true;
        self
    }

    pub fn count(mut self) -> Self {
        self.count = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn list(mut self) -> Self {
        self.list = true;
        self
    }

    pub fn is_edge(&self) -> bool {
        self.ty == ScalarType::Uid
    }

    pub fn has_index(&self, kind: IndexKind) -> bool {
        self.indexes.contains(&kind)
    }

    /// First ordered index, if any, used for equality and range lookups.
    pub fn ordered_index(&self) -> Option<IndexKind> {
        self.indexes.iter().copied().find(|k| k.is_ordered())
    }

    fn validate(&self) -> Result<()> {
        let invalid = |reason: String| {
            Err(StoreError::InvalidSchema(format!(
                "predicate `{}`: {reason}",
                self.name
            )))
        };
        if self.name.is_empty() {
            return Err(StoreError::InvalidSchema("empty predicate name".into()));
        }
        for kind in &self.indexes {
            if !kind.supports(self.ty) {
                return invalid(format!(
                    "index `{}` does not apply to {}",
                    kind.keyword(),
                    self.ty.keyword()
                ));
            }
        }
        if (self.reverse || self.count) && !self.is_edge() {
            return invalid("@reverse/@count only apply to uid predicates".into());
        }
        if self.list && !self.is_edge() {
            return invalid("only uid predicates can hold a list".into());
        }
        if self.unique && !self.has_index(IndexKind::Exact) && self.ordered_index().is_none() {
            return invalid("@unique needs an exact or ordered index".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDef {
    pub name: String,
    pub fields: Vec<String>,
}

impl TypeDef {
    pub fn has_field(&self, predicate: &str) -> bool {
        self.fields.iter().any(|f| f == predicate)
    }
}

/// A full schema: global predicates plus the node types that use them.
///
/// Predicates are shared by name across types, so `name` on a doctor and `name` on a
/// patient are the same predicate with the same indexes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDef {
    pub predicates: BTreeMap<String, PredicateDef>,
    pub types: BTreeMap<String, TypeDef>,
}

impl SchemaDef {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a predicate. Declaring the same predicate twice is allowed only when both
    /// declarations are identical.
    pub fn add_predicate(&mut self, def: PredicateDef) -> Result<()> {
        def.validate()?;
        match self.predicates.get(&def.name) {
            Some(existing) if *existing != def => Err(StoreError::SchemaConflict {
                predicate: def.name.clone(),
                reason: format!(
                    "declared as `{}` and again as `{}`",
                    existing.render(),
                    def.render()
                ),
            }),
            Some(_) => Ok(()),
            None => {
                self.predicates.insert(def.name.clone(), def);
                Ok(())
            }
        }
    }

    pub fn add_type(&mut self, name: impl Into<String>, fields: &[&str]) {
        let name = name.into();
        let fields = fields.iter().map(|f| f.to_string()).collect();
        self.types.insert(name.clone(), TypeDef { name, fields });
    }

    pub fn predicate(&self, name: &str) -> Option<&PredicateDef> {
        self.predicates.get(name)
    }

    pub fn type_def(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    /// Checks that every type field names a declared predicate.
    pub fn validate(&self) -> Result<()> {
        for def in self.predicates.values() {
            def.validate()?;
        }
        for ty in self.types.values() {
            for field in &ty.fields {
                if !self.predicates.contains_key(field) {
                    return Err(StoreError::InvalidSchema(format!(
                        "type `{}` lists undeclared predicate `{field}`",
                        ty.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Renders the schema in the conventional text form, one predicate per line
    /// followed by the type blocks.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for def in self.predicates.values() {
            let _ = writeln!(out, "{}", def.render());
        }
        for ty in self.types.values() {
            let _ = writeln!(out, "\ntype {} {{", ty.name);
            for field in &ty.fields {
                let _ = writeln!(out, "    {field}");
            }
            out.push('}');
            out.push('\n');
        }
        out
    }
}

impl PredicateDef {
    pub fn render(&self) -> String {
        let ty = if self.list {
            format!("[{}]", self.ty.keyword())
        } else {
            self.ty.keyword().to_string()
        };
        let mut line = format!("{}: {ty}", self.name);
        if !self.indexes.is_empty() {
            let kinds: Vec<_> = self.indexes.iter().map(|k| k.keyword()).collect();
            let _ = write!(line, " @index({})", kinds.join(", "));
        }
        if self.reverse {
            line.push_str(" @reverse");
        }
        if self.count {
            line.push_str(" @count");
        }
        if self.unique {
            line.push_str(" @unique");
        }
        line.push_str(" .");
        line
    }
}
