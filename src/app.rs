use std::collections::BTreeMap;
use std::path::Path;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::annotation::AnnotationClient;
use crate::classify::{classify, read_hits};
use crate::config::ResolvedConfig;
use crate::domain::{ClassificationResult, GramStain, VirulenceFactorRecord};
use crate::error::KiraError;
use crate::reconcile::{ReconcileSummary, Reconciler};
use crate::report::{CategoryStats, aggregate};
use crate::store::{FileReferenceStore, ReferenceStore, write_bytes_atomic};

#[derive(Debug, Clone, Serialize)]
pub struct ClassifyReport {
    pub input: String,
    pub gram: GramStain,
    pub reference_records: usize,
    #[serde(flatten)]
    pub result: ClassificationResult,
    pub categories: BTreeMap<String, CategoryStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReferenceResult {
    pub path: String,
    pub records: Vec<VirulenceFactorRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackupResult {
    pub source: String,
    pub backup: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateResult {
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub level: EventLevel,
    pub message: String,
    pub elapsed: Option<Duration>,
}

impl ProgressEvent {
    pub fn new(level: EventLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            elapsed: None,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(EventLevel::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(EventLevel::Warning, message)
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = Some(elapsed);
        self
    }
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn event(&self, _event: ProgressEvent) {}
}

pub const TEMPLATE_CSV: &str = "gene,identidade,cobertura\ngeneA,99.5,100\ngeneB,87.3,96\ngeneC,92.1,98\n";

pub struct App<A: AnnotationClient> {
    config: ResolvedConfig,
    store: FileReferenceStore,
    annotation: A,
}

impl<A: AnnotationClient> App<A> {
    pub fn new(config: ResolvedConfig, annotation: A) -> Self {
        let store = FileReferenceStore::new(config.reference_path.clone());
        Self {
            config,
            store,
            annotation,
        }
    }

    pub fn store(&self) -> &FileReferenceStore {
        &self.store
    }

    pub fn reconcile(&self, sink: &dyn ProgressSink) -> Result<ReconcileSummary, KiraError> {
        let started = Instant::now();
        let reconciler = Reconciler::new(
            &self.annotation,
            &self.store,
            &self.config.organisms,
            &self.config.keyword,
        )
        .with_manual(self.config.manual_path.clone())
        .with_lock(self.store.lock_path());
        let summary = reconciler.run(sink)?;
        sink.event(
            ProgressEvent::info(format!(
                "phase=Done; {} records written to {}",
                summary.total, summary.reference_path
            ))
            .with_elapsed(started.elapsed()),
        );
        Ok(summary)
    }

    pub fn classify(
        &self,
        input: &Path,
        gram: GramStain,
        sink: &dyn ProgressSink,
    ) -> Result<ClassifyReport, KiraError> {
        let hits = read_hits(input)?;
        sink.event(ProgressEvent::info(format!(
            "phase=Resolve; {} hits read from {}",
            hits.len(),
            input.display()
        )));
        let reference = self.store.load(sink)?;
        let result = classify(&hits, gram, &reference);
        let categories = aggregate(&result.details);
        Ok(ClassifyReport {
            input: input.display().to_string(),
            gram,
            reference_records: reference.len(),
            result,
            categories,
        })
    }

    pub fn reference(&self, sink: &dyn ProgressSink) -> Result<ReferenceResult, KiraError> {
        let records = self.store.load(sink)?;
        Ok(ReferenceResult {
            path: self.store.path().to_string(),
            records,
        })
    }

    pub fn backup(&self, sink: &dyn ProgressSink) -> Result<BackupResult, KiraError> {
        let backup = self.store.backup()?;
        sink.event(ProgressEvent::info(format!("phase=Store; backup at {backup}")));
        Ok(BackupResult {
            source: self.store.path().to_string(),
            backup: backup.to_string(),
        })
    }
}

/// Writes the model input file users fill in before classifying.
pub fn write_template(path: Option<&Utf8Path>) -> Result<TemplateResult, KiraError> {
    let path = path
        .map(Utf8Path::to_path_buf)
        .unwrap_or_else(|| Utf8PathBuf::from("modelo_entrada.csv"));
    write_bytes_atomic(&path, TEMPLATE_CSV.as_bytes())?;
    Ok(TemplateResult {
        path: path.to_string(),
    })
}
