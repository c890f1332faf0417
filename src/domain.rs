use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::de;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::KiraError;

pub const UNKNOWN_CATEGORY: &str = "unknown";
pub const NOT_CLASSIFIED: &str = "not classified";

/// Gram affinity of a reference record. `Both` matches either stain; a cell
/// that names no known affinity is kept verbatim as `Other` and matches
/// neither.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GramAffinity {
    Neg,
    Pos,
    Both,
    Other(String),
}

impl GramAffinity {
    pub fn as_str(&self) -> &str {
        match self {
            GramAffinity::Neg => "neg",
            GramAffinity::Pos => "pos",
            GramAffinity::Both => "both",
            GramAffinity::Other(value) => value.as_str(),
        }
    }

    fn recognize(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "neg" | "negative" | "gram-" | "gram-negative" | "gram negative" => {
                Some(GramAffinity::Neg)
            }
            "pos" | "positive" | "gram+" | "gram-positive" | "gram positive" => {
                Some(GramAffinity::Pos)
            }
            "both" => Some(GramAffinity::Both),
            _ => None,
        }
    }

    /// Lenient parse used for table cells.
    pub fn from_cell(value: &str) -> Self {
        Self::recognize(value).unwrap_or_else(|| GramAffinity::Other(value.trim().to_string()))
    }

    pub fn accepts(&self, stain: GramStain) -> bool {
        match self {
            GramAffinity::Both => true,
            GramAffinity::Neg => stain == GramStain::Neg,
            GramAffinity::Pos => stain == GramStain::Pos,
            GramAffinity::Other(_) => false,
        }
    }
}

impl FromStr for GramAffinity {
    type Err = KiraError;

    /// Strict parse: only the known spellings of neg, pos and both.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::recognize(value).ok_or_else(|| KiraError::InvalidGram(value.to_string()))
    }
}

impl Serialize for GramAffinity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for GramAffinity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(GramAffinity::from_cell(&value))
    }
}

fn strict_gram<'de, D: Deserializer<'de>>(deserializer: D) -> Result<GramAffinity, D::Error> {
    let value = String::deserialize(deserializer)?;
    value.parse().map_err(de::Error::custom)
}

impl fmt::Display for GramAffinity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Stain of the organism a hit list was sampled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GramStain {
    Neg,
    Pos,
}

impl fmt::Display for GramStain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GramStain::Neg => write!(f, "neg"),
            GramStain::Pos => write!(f, "pos"),
        }
    }
}

impl From<GramStain> for GramAffinity {
    fn from(value: GramStain) -> Self {
        match value {
            GramStain::Neg => GramAffinity::Neg,
            GramStain::Pos => GramAffinity::Pos,
        }
    }
}

impl FromStr for GramStain {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.parse::<GramAffinity>()? {
            GramAffinity::Neg => Ok(GramStain::Neg),
            GramAffinity::Pos => Ok(GramStain::Pos),
            _ => Err(KiraError::InvalidGram(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirulenceFactorRecord {
    pub gene: String,
    pub category: String,
    pub gram: GramAffinity,
    pub weight: f64,
    pub evidence: bool,
}

impl VirulenceFactorRecord {
    /// Builds a record from raw cell values, applying the same normalization
    /// regardless of where the row came from.
    pub fn from_cells(
        gene: &str,
        category: Option<&str>,
        gram: Option<&str>,
        weight: Option<&str>,
        evidence: Option<&str>,
    ) -> Self {
        Self {
            gene: normalize_gene(gene),
            category: normalize_category(category),
            gram: GramAffinity::from_cell(gram.unwrap_or("")),
            weight: weight.map(coerce_weight).unwrap_or(0.0),
            evidence: evidence.map(parse_evidence).unwrap_or(false),
        }
    }

    pub fn normalized(self) -> Self {
        Self {
            gene: normalize_gene(&self.gene),
            category: normalize_category(Some(&self.category)),
            gram: self.gram,
            weight: sanitize_weight(self.weight),
            evidence: self.evidence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneHit {
    pub gene_name: String,
    pub identity: f64,
    pub coverage: f64,
}

impl GeneHit {
    pub fn new(gene_name: impl Into<String>, identity: f64, coverage: f64) -> Self {
        Self {
            gene_name: gene_name.into(),
            identity,
            coverage,
        }
    }

    pub fn from_cells(gene: &str, identity: &str, coverage: &str) -> Self {
        Self {
            gene_name: gene.to_string(),
            identity: coerce_number(identity),
            coverage: coerce_number(coverage),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationDetail {
    pub gene: String,
    pub category: String,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskLabel {
    High,
    Moderate,
    Low,
}

impl RiskLabel {
    pub const HIGH_THRESHOLD: f64 = 20.0;
    pub const MODERATE_THRESHOLD: f64 = 10.0;

    pub fn from_total(total: f64) -> Self {
        if total >= Self::HIGH_THRESHOLD {
            RiskLabel::High
        } else if total >= Self::MODERATE_THRESHOLD {
            RiskLabel::Moderate
        } else {
            RiskLabel::Low
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RiskLabel::High => "High probability of pathogenicity",
            RiskLabel::Moderate => "Moderate pathogenic potential",
            RiskLabel::Low => "Low probability of being pathogenic",
        }
    }
}

impl fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub total_score: f64,
    pub risk: RiskLabel,
    pub label: String,
    pub details: Vec<ClassificationDetail>,
}

/// Catalog entry for the automatic fetch: an NCBI taxonomy id and the gram
/// affinity assigned to every gene fetched for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organism {
    pub id: String,
    #[serde(deserialize_with = "strict_gram")]
    pub gram: GramAffinity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Organism {
    pub fn new(id: &str, gram: GramAffinity, name: &str) -> Self {
        Self {
            id: id.to_string(),
            gram,
            name: Some(name.to_string()),
        }
    }

    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("{} ({name})", self.id),
            None => self.id.clone(),
        }
    }
}

impl FromStr for Organism {
    type Err = KiraError;

    /// Parses the `<taxonomy id>:<gram>` shorthand.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (id, gram) = value
            .trim()
            .split_once(':')
            .ok_or_else(|| KiraError::InvalidOrganism(value.to_string()))?;
        let id = id.trim();
        if id.is_empty() || !id.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(KiraError::InvalidOrganism(value.to_string()));
        }
        let gram = gram
            .parse()
            .map_err(|_| KiraError::InvalidOrganism(value.to_string()))?;
        Ok(Self {
            id: id.to_string(),
            gram,
            name: None,
        })
    }
}

pub fn normalize_gene(value: &str) -> String {
    value.trim().to_lowercase()
}

fn normalize_category(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(category) if !category.is_empty() => category.to_string(),
        _ => UNKNOWN_CATEGORY.to_string(),
    }
}

/// Parses a numeric cell, accepting a comma decimal separator. Anything that
/// does not parse to a finite number becomes 0.
pub fn coerce_number(value: &str) -> f64 {
    let trimmed = value.trim();
    let parsed = trimmed
        .parse::<f64>()
        .or_else(|_| trimmed.replace(',', ".").parse::<f64>());
    match parsed {
        Ok(number) if number.is_finite() => number,
        _ => 0.0,
    }
}

pub fn coerce_weight(value: &str) -> f64 {
    sanitize_weight(coerce_number(value))
}

fn sanitize_weight(weight: f64) -> f64 {
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        0.0
    }
}

pub fn parse_evidence(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}
