use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};

use camino::Utf8PathBuf;
use serde::Serialize;

use crate::annotation::{AnnotationClient, parse_gene_aliases};
use crate::app::{EventLevel, ProgressEvent, ProgressSink};
use crate::domain::{Organism, UNKNOWN_CATEGORY, VirulenceFactorRecord, normalize_gene};
use crate::error::KiraError;
use crate::store::{ReferenceStore, records_from_table};
use crate::table::Table;

pub const AUTOMATIC_WEIGHT: f64 = 3.0;

#[derive(Debug, Clone, Default)]
pub struct AutomaticSet {
    pub records: Vec<VirulenceFactorRecord>,
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileSummary {
    pub reference_path: String,
    pub automatic: usize,
    pub manual: Option<usize>,
    pub total: usize,
    pub skipped_organisms: Vec<String>,
}

/// Queries the annotation source once per catalog entry, strictly in order.
/// An organism whose request fails is skipped; the rest still run.
pub fn fetch_automatic<A: AnnotationClient>(
    client: &A,
    catalog: &[Organism],
    keyword: &str,
    sink: &dyn ProgressSink,
) -> AutomaticSet {
    let mut set = AutomaticSet::default();
    for organism in catalog {
        sink.event(ProgressEvent::info(format!(
            "phase=Fetch; organism {}",
            organism.label()
        )));
        let body = match client.fetch_organism(&organism.id, keyword) {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(organism = %organism.id, error = %err, "skipping organism");
                sink.event(ProgressEvent::warning(format!(
                    "skipped organism {}: {err}",
                    organism.label()
                )));
                set.skipped.push(organism.id.clone());
                continue;
            }
        };
        let aliases = parse_gene_aliases(&body);
        tracing::debug!(organism = %organism.id, aliases = aliases.len(), "annotation parsed");
        set.records.extend(aliases.iter().map(|alias| VirulenceFactorRecord {
            gene: normalize_gene(alias),
            category: UNKNOWN_CATEGORY.to_string(),
            gram: organism.gram.clone(),
            weight: AUTOMATIC_WEIGHT,
            evidence: true,
        }));
    }
    set.records = dedupe_by_gene(set.records);
    set
}

/// Keeps the first record for every gene key. Gram affinity is not part of
/// the key.
pub fn dedupe_by_gene(records: Vec<VirulenceFactorRecord>) -> Vec<VirulenceFactorRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| !record.gene.is_empty() && seen.insert(record.gene.clone()))
        .collect()
}

/// Manual entries go first, so they shadow automatic entries with the same
/// gene whatever their gram affinity.
pub fn merge_with_manual(
    automatic: Vec<VirulenceFactorRecord>,
    manual: Option<Vec<VirulenceFactorRecord>>,
    sink: &dyn ProgressSink,
) -> Vec<VirulenceFactorRecord> {
    let Some(manual) = manual else {
        tracing::warn!("no manual table; using automatic records only");
        sink.event(ProgressEvent::warning(
            "manual table not found; using automatic records only",
        ));
        return automatic;
    };

    let combined = manual
        .into_iter()
        .chain(automatic)
        .map(VirulenceFactorRecord::normalized)
        .collect::<Vec<_>>();
    dedupe_by_gene(combined)
}

pub struct Reconciler<'a, A: AnnotationClient, S: ReferenceStore> {
    client: &'a A,
    store: &'a S,
    catalog: &'a [Organism],
    keyword: &'a str,
    manual_path: Option<Utf8PathBuf>,
    lock_path: Option<Utf8PathBuf>,
}

impl<'a, A: AnnotationClient, S: ReferenceStore> Reconciler<'a, A, S> {
    pub fn new(client: &'a A, store: &'a S, catalog: &'a [Organism], keyword: &'a str) -> Self {
        Self {
            client,
            store,
            catalog,
            keyword,
            manual_path: None,
            lock_path: None,
        }
    }

    pub fn with_manual(mut self, path: Option<Utf8PathBuf>) -> Self {
        self.manual_path = path;
        self
    }

    pub fn with_lock(mut self, path: Utf8PathBuf) -> Self {
        self.lock_path = Some(path);
        self
    }

    /// Rebuilds the reference table from scratch and replaces the stored one.
    pub fn run(&self, sink: &dyn ProgressSink) -> Result<ReconcileSummary, KiraError> {
        let _lock = match &self.lock_path {
            Some(path) => Some(WriterLock::acquire(path)?),
            None => None,
        };

        tracing::info!(organisms = self.catalog.len(), "fetching automatic records");
        let automatic = fetch_automatic(self.client, self.catalog, self.keyword, sink);
        let automatic_count = automatic.records.len();

        let manual = self.load_manual(sink)?;
        let manual_count = manual.as_ref().map(Vec::len);

        let merged = merge_with_manual(automatic.records, manual, sink);
        if merged.is_empty() {
            sink.event(ProgressEvent::warning("reconciliation produced an empty reference table"));
        }
        self.store.persist(&merged)?;
        tracing::info!(
            automatic = automatic_count,
            manual = ?manual_count,
            total = merged.len(),
            "reconciliation complete"
        );

        Ok(ReconcileSummary {
            reference_path: self.store.location(),
            automatic: automatic_count,
            manual: manual_count,
            total: merged.len(),
            skipped_organisms: automatic.skipped,
        })
    }

    fn load_manual(
        &self,
        sink: &dyn ProgressSink,
    ) -> Result<Option<Vec<VirulenceFactorRecord>>, KiraError> {
        let Some(path) = &self.manual_path else {
            return Ok(None);
        };
        if !path.as_std_path().exists() {
            return Ok(None);
        }
        sink.event(ProgressEvent::new(
            EventLevel::Info,
            format!("phase=Merge; manual table {path}"),
        ));
        let table = Table::read(path.as_std_path())?;
        Ok(Some(records_from_table(&table, "manual table", sink)))
    }
}

/// Single-writer guard: the lock file is created exclusively, records the
/// owning pid and start time, and is removed on drop.
struct WriterLock {
    path: Utf8PathBuf,
}

impl WriterLock {
    fn acquire(path: &Utf8PathBuf) -> Result<Self, KiraError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        }
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path.as_std_path())
        {
            Ok(mut file) => {
                let lock = Self { path: path.clone() };
                writeln!(
                    file,
                    "pid={}\nstarted={}",
                    std::process::id(),
                    chrono::Local::now().to_rfc3339()
                )
                .map_err(|err| KiraError::Filesystem(err.to_string()))?;
                Ok(lock)
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                Err(KiraError::ReconcileInProgress(path.clone().into_std_path_buf()))
            }
            Err(err) => Err(KiraError::Filesystem(err.to_string())),
        }
    }
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(self.path.as_std_path());
    }
}
