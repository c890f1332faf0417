use std::collections::HashMap;
use std::path::Path;

use crate::domain::{
    ClassificationDetail, ClassificationResult, GeneHit, GramStain, NOT_CLASSIFIED, RiskLabel,
    VirulenceFactorRecord, normalize_gene, round2,
};
use crate::error::KiraError;
use crate::table::{ColumnMap, ColumnSpec, MatchMode, Table};

pub const MIN_IDENTITY: f64 = 85.0;
pub const MIN_COVERAGE: f64 = 95.0;
pub const EVIDENCE_MULTIPLIER: f64 = 1.5;

const INPUT_SPECS: &[ColumnSpec] = &[
    ColumnSpec {
        key: "gene",
        aliases: &["gene"],
        required: true,
    },
    ColumnSpec {
        key: "identity",
        aliases: &["identidade", "identity"],
        required: true,
    },
    ColumnSpec {
        key: "coverage",
        aliases: &["cobertura", "coverage"],
        required: true,
    },
];

/// Reference records grouped by gene, each group kept in table order.
struct ReferenceIndex<'a> {
    by_gene: HashMap<&'a str, Vec<&'a VirulenceFactorRecord>>,
}

impl<'a> ReferenceIndex<'a> {
    fn new(reference: &'a [VirulenceFactorRecord]) -> Self {
        let mut by_gene: HashMap<&str, Vec<&VirulenceFactorRecord>> = HashMap::new();
        for record in reference {
            by_gene.entry(record.gene.as_str()).or_default().push(record);
        }
        Self { by_gene }
    }

    /// First record in table order whose gram affinity admits `gram`.
    fn lookup(&self, gene: &str, gram: GramStain) -> Option<&'a VirulenceFactorRecord> {
        self.by_gene
            .get(gene)?
            .iter()
            .copied()
            .find(|record| record.gram.accepts(gram))
    }
}

pub fn passes_thresholds(hit: &GeneHit) -> bool {
    hit.identity >= MIN_IDENTITY && hit.coverage >= MIN_COVERAGE
}

pub fn adjusted_weight(record: &VirulenceFactorRecord) -> f64 {
    if record.evidence {
        record.weight * EVIDENCE_MULTIPLIER
    } else {
        record.weight
    }
}

/// Scores every hit against the reference, in input order. The total is the
/// sum of the per-gene scores as reported.
pub fn classify(
    hits: &[GeneHit],
    gram: GramStain,
    reference: &[VirulenceFactorRecord],
) -> ClassificationResult {
    let index = ReferenceIndex::new(reference);
    let details = hits
        .iter()
        .map(|hit| {
            let gene = normalize_gene(&hit.gene_name);
            let (category, score) = match index.lookup(&gene, gram) {
                None => (NOT_CLASSIFIED.to_string(), 0.0),
                Some(record) if !passes_thresholds(hit) => (record.category.clone(), 0.0),
                Some(record) => (record.category.clone(), round2(adjusted_weight(record))),
            };
            tracing::debug!(gene = %hit.gene_name, %category, score, "hit classified");
            ClassificationDetail {
                gene: hit.gene_name.clone(),
                category,
                score,
            }
        })
        .collect::<Vec<_>>();

    let total_score = details.iter().map(|detail| detail.score).sum::<f64>();
    let risk = RiskLabel::from_total(total_score);
    ClassificationResult {
        total_score,
        risk,
        label: risk.description().to_string(),
        details,
    }
}

pub fn read_hits(path: &Path) -> Result<Vec<GeneHit>, KiraError> {
    if !path.exists() {
        return Err(KiraError::InputMissing(path.to_path_buf()));
    }
    hits_from_table(&Table::read(path)?)
}

/// Maps the input header by substring and turns every row into a hit.
/// Numeric cells that do not parse become 0.
pub fn hits_from_table(table: &Table) -> Result<Vec<GeneHit>, KiraError> {
    let columns = ColumnMap::resolve("input file", &table.headers, INPUT_SPECS, MatchMode::Contains)?;
    let gene = columns.index("gene");
    let identity = columns.index("identity");
    let coverage = columns.index("coverage");

    Ok(table
        .rows
        .iter()
        .map(|row| {
            GeneHit::from_cells(
                Table::cell(row, gene).unwrap_or(""),
                Table::cell(row, identity).unwrap_or(""),
                Table::cell(row, coverage).unwrap_or(""),
            )
        })
        .collect())
}
