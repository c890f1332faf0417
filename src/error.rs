use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KiraError {
    #[error("missing required column `{column}` in {table}")]
    #[diagnostic(help("expected a header matching one of: {expected}"))]
    MissingColumn {
        table: String,
        column: String,
        expected: String,
    },

    #[error("column `{column}` in {table} is ambiguous: matched {candidates}")]
    #[diagnostic(help("rename the extra columns so exactly one header matches"))]
    AmbiguousColumn {
        table: String,
        column: String,
        candidates: String,
    },

    #[error("reference table not found at {0}")]
    #[diagnostic(help("run `kira-vf reconcile` to build it"))]
    ReferenceMissing(PathBuf),

    #[error("input file not found: {0}")]
    InputMissing(PathBuf),

    #[error("invalid gram stain: {0}")]
    InvalidGram(String),

    #[error("invalid organism entry: {0}")]
    InvalidOrganism(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("annotation request failed: {0}")]
    AnnotationHttp(String),

    #[error("annotation source returned status {status}: {message}")]
    AnnotationStatus { status: u16, message: String },

    #[error("another reconciliation is already running (lock held at {0})")]
    #[diagnostic(help(
        "the lock file records the owning pid and start time; if that process is gone the file is stale and safe to remove"
    ))]
    ReconcileInProgress(PathBuf),

    #[error("malformed table: {0}")]
    Table(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
