use crate::error::{SourceError, SourceRecordError};
use crate::record::{EntityKind, KindShape, NodeType, RawRecord};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub type RowResult = std::result::Result<RawRecord, SourceRecordError>;

/// Supplies the rows of each entity kind.
///
/// Every call starts from the beginning of the input. A malformed row is returned in
/// place as a [`SourceRecordError`] so the caller can skip it and keep going; only an
/// input that cannot be read at all is a [`SourceError`].
pub trait RecordSource {
    fn records(&self, kind: EntityKind) -> Result<Vec<RowResult>, SourceError>;
}

/// Columns a row of `kind` cannot do without.
fn key_columns(kind: EntityKind) -> Vec<&'static str> {
    match kind.shape() {
        KindShape::Link(shape) => vec![shape.source_column, shape.target_column],
        KindShape::Node(NodeType::VitalSignReading | NodeType::Visitor) => vec!["patient_id"],
        KindShape::Node(t) => t.natural_key().into_iter().collect(),
    }
}

/// Reads one CSV file per entity kind from a directory.
#[derive(Debug, Clone)]
pub struct CsvSource {
    dir: PathBuf,
    files: HashMap<EntityKind, PathBuf>,
}

impl CsvSource {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            files: HashMap::new(),
        }
    }

    /// Reads `kind` from `path` instead of `<dir>/<kind>.csv`. Relative paths are
    /// taken from the source directory.
    pub fn with_file(mut self, kind: EntityKind, path: impl Into<PathBuf>) -> Self {
        self.files.insert(kind, path.into());
        self
    }

    pub fn path_for(&self, kind: EntityKind) -> PathBuf {
        match self.files.get(&kind) {
            Some(p) => self.dir.join(p),
            None => self.dir.join(kind.file_name()),
        }
    }
}

impl RecordSource for CsvSource {
    fn records(&self, kind: EntityKind) -> Result<Vec<RowResult>, SourceError> {
        let path = self.path_for(kind);
        if !path.exists() {
            tracing::warn!(entity = %kind, path = %path.display(), "source file not found, nothing to load");
            return Ok(Vec::new());
        }

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&path)
            .map_err(|source| SourceError::Open {
                path: path.clone(),
                source,
            })?;
        let headers = rdr
            .headers()
            .map_err(|source| SourceError::Header {
                path: path.clone(),
                source,
            })?
            .clone();
        for column in key_columns(kind) {
            if !headers.iter().any(|h| h == column) {
                return Err(SourceError::MissingColumn {
                    path,
                    column: column.to_string(),
                });
            }
        }

        let mut rows = Vec::new();
        for (i, result) in rdr.records().enumerate() {
            // header is line 1
            let fallback_line = i as u64 + 2;
            let row = match result {
                Ok(record) => {
                    let line = record.position().map_or(fallback_line, |p| p.line());
                    let mut raw = RawRecord::new(line);
                    for (column, value) in headers.iter().zip(record.iter()) {
                        raw.fields.insert(column.to_string(), value.to_string());
                    }
                    Ok(raw)
                }
                Err(e) => Err(SourceRecordError {
                    entity: kind,
                    line: e
                        .position()
                        .map_or(fallback_line, |p| p.line()),
                    reason: e.to_string(),
                }),
            };
            rows.push(row);
        }
        tracing::debug!(entity = %kind, path = %path.display(), rows = rows.len(), "read source file");
        Ok(rows)
    }
}

/// In-memory rows, mainly for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    rows: HashMap<EntityKind, Vec<RawRecord>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: EntityKind, record: RawRecord) {
        self.rows.entry(kind).or_default().push(record);
    }

    /// Adds rows given as `(column, value)` pairs; lines are numbered from 2.
    pub fn with_rows(mut self, kind: EntityKind, rows: &[&[(&str, &str)]]) -> Self {
        let start = self.rows.get(&kind).map_or(0, Vec::len) as u64;
        for (i, cells) in rows.iter().enumerate() {
            let raw = cells
                .iter()
                .fold(RawRecord::new(start + i as u64 + 2), |r, (k, v)| r.with(*k, *v));
            self.push(kind, raw);
        }
        self
    }
}

impl RecordSource for MemorySource {
    fn records(&self, kind: EntityKind) -> Result<Vec<RowResult>, SourceError> {
        Ok(self
            .rows
            .get(&kind)
            .map(|rows| rows.iter().cloned().map(Ok).collect())
            .unwrap_or_default())
    }
}

impl<T: RecordSource + ?Sized> RecordSource for &T {
    fn records(&self, kind: EntityKind) -> Result<Vec<RowResult>, SourceError> {
        (**self).records(kind)
    }
}
