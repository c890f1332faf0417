use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tempfile::Builder;

use crate::app::{EventLevel, ProgressEvent, ProgressSink};
use crate::domain::VirulenceFactorRecord;
use crate::error::KiraError;
use crate::table::{ColumnMap, ColumnSpec, MatchMode, Table};

pub const REFERENCE_COLUMNS: [&str; 5] = ["gene", "categoria", "gram", "peso", "evidencia"];

const REFERENCE_SPECS: &[ColumnSpec] = &[
    ColumnSpec {
        key: "gene",
        aliases: &["gene"],
        required: true,
    },
    ColumnSpec {
        key: "categoria",
        aliases: &["categoria", "category"],
        required: false,
    },
    ColumnSpec {
        key: "gram",
        aliases: &["gram"],
        required: false,
    },
    ColumnSpec {
        key: "peso",
        aliases: &["peso", "weight"],
        required: false,
    },
    ColumnSpec {
        key: "evidencia",
        aliases: &["evidencia", "evidence"],
        required: false,
    },
];

pub trait ReferenceStore {
    fn load(&self, sink: &dyn ProgressSink) -> Result<Vec<VirulenceFactorRecord>, KiraError>;
    fn persist(&self, records: &[VirulenceFactorRecord]) -> Result<(), KiraError>;
    fn location(&self) -> String;
}

/// Reference table backed by a single delimited file.
#[derive(Debug, Clone)]
pub struct FileReferenceStore {
    path: Utf8PathBuf,
}

impl FileReferenceStore {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.as_std_path().exists()
    }

    pub fn lock_path(&self) -> Utf8PathBuf {
        self.path.with_extension("lock")
    }

    /// Copies the current table next to itself with a timestamp suffix.
    pub fn backup(&self) -> Result<Utf8PathBuf, KiraError> {
        if !self.exists() {
            return Err(KiraError::ReferenceMissing(self.path.clone().into_std_path_buf()));
        }
        let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
        let stem = self.path.file_stem().unwrap_or("reference");
        let name = format!("{stem}_backup_{stamp}.csv");
        let dest = match self.path.parent() {
            Some(parent) => parent.join(name),
            None => Utf8PathBuf::from(name),
        };
        let table = Table::read(self.path.as_std_path())?;
        write_table_atomic(&dest, &table)?;
        tracing::info!(path = %dest, "reference table backed up");
        Ok(dest)
    }
}

impl ReferenceStore for FileReferenceStore {
    fn load(&self, sink: &dyn ProgressSink) -> Result<Vec<VirulenceFactorRecord>, KiraError> {
        if !self.exists() {
            return Err(KiraError::ReferenceMissing(self.path.clone().into_std_path_buf()));
        }
        let table = Table::read(self.path.as_std_path())?;
        Ok(records_from_table(&table, "reference table", sink))
    }

    fn persist(&self, records: &[VirulenceFactorRecord]) -> Result<(), KiraError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for record in records {
            writer
                .serialize(ReferenceRow::from(record))
                .map_err(|err| KiraError::Table(err.to_string()))?;
        }
        if records.is_empty() {
            writer
                .write_record(REFERENCE_COLUMNS)
                .map_err(|err| KiraError::Table(err.to_string()))?;
        }
        let content = writer
            .into_inner()
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        write_bytes_atomic(&self.path, &content)?;
        tracing::info!(path = %self.path, records = records.len(), "reference table persisted");
        Ok(())
    }

    fn location(&self) -> String {
        self.path.to_string()
    }
}

/// Normalizes a parsed table into records. A table without a gene column is
/// reported through `sink` and yields no records.
pub fn records_from_table(
    table: &Table,
    label: &str,
    sink: &dyn ProgressSink,
) -> Vec<VirulenceFactorRecord> {
    let columns = match ColumnMap::resolve(label, &table.headers, REFERENCE_SPECS, MatchMode::Exact)
    {
        Ok(columns) => columns,
        Err(err) => {
            tracing::error!(table = label, error = %err, "unusable header");
            sink.event(ProgressEvent::new(EventLevel::Error, err.to_string()));
            return Vec::new();
        }
    };

    let gene = columns.index("gene");
    let category = columns.index("categoria");
    let gram = columns.index("gram");
    let weight = columns.index("peso");
    let evidence = columns.index("evidencia");

    table
        .rows
        .iter()
        .filter_map(|row| {
            let gene_cell = Table::cell(row, gene)?;
            if gene_cell.trim().is_empty() {
                return None;
            }
            Some(VirulenceFactorRecord::from_cells(
                gene_cell,
                Table::cell(row, category),
                Table::cell(row, gram),
                Table::cell(row, weight),
                Table::cell(row, evidence),
            ))
        })
        .collect()
}

#[derive(Serialize)]
struct ReferenceRow<'a> {
    gene: &'a str,
    categoria: &'a str,
    gram: &'a str,
    peso: f64,
    evidencia: bool,
}

impl<'a> From<&'a VirulenceFactorRecord> for ReferenceRow<'a> {
    fn from(record: &'a VirulenceFactorRecord) -> Self {
        Self {
            gene: &record.gene,
            categoria: &record.category,
            gram: record.gram.as_str(),
            peso: record.weight,
            evidencia: record.evidence,
        }
    }
}

fn write_table_atomic(path: &Utf8Path, table: &Table) -> Result<(), KiraError> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    writer
        .write_record(&table.headers)
        .map_err(|err| KiraError::Table(err.to_string()))?;
    for row in &table.rows {
        writer
            .write_record(row)
            .map_err(|err| KiraError::Table(err.to_string()))?;
    }
    let content = writer
        .into_inner()
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    write_bytes_atomic(path, &content)
}

/// Writes into a temp file in the destination directory and renames it over
/// `path`, so readers see either the old or the new content.
pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), KiraError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent.to_path_buf(),
        _ => Utf8PathBuf::from("."),
    };
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    let temp = Builder::new()
        .prefix("kira-vf-table")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    fs::write(temp.path(), content).map_err(|err| KiraError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::NoopSink;
    use crate::domain::GramAffinity;

    #[test]
    fn lock_path_sits_next_to_table() {
        let store = FileReferenceStore::new("data/base_virulencia.csv");
        assert_eq!(store.lock_path(), Utf8PathBuf::from("data/base_virulencia.lock"));
    }

    #[test]
    fn records_from_table_fills_defaults() {
        let table = Table::parse("Gene,gram\nInvA,neg\n  ,pos\n").unwrap();
        let records = records_from_table(&table, "reference table", &NoopSink);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].gene, "inva");
        assert_eq!(records[0].category, "unknown");
        assert_eq!(records[0].gram, GramAffinity::Neg);
        assert_eq!(records[0].weight, 0.0);
        assert!(!records[0].evidence);
    }
}
