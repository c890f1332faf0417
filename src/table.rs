//! Delimited text tables: encoding fallback, delimiter sniffing and the
//! header-to-column mapping used by every reader in the crate.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use csv::ReaderBuilder;

use crate::error::KiraError;

const DELIMITER_CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];

#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn read(path: &Path) -> Result<Self, KiraError> {
        let bytes = fs::read(path)
            .map_err(|err| KiraError::Filesystem(format!("read {}: {err}", path.display())))?;
        Self::parse(&decode(&bytes))
    }

    pub fn parse(text: &str) -> Result<Self, KiraError> {
        let delimiter = sniff_delimiter(text);
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers = reader
            .headers()
            .map_err(|err| KiraError::Table(err.to_string()))?
            .iter()
            .map(|h| h.to_string())
            .collect::<Vec<_>>();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|err| KiraError::Table(err.to_string()))?;
            if record.is_empty() {
                continue;
            }
            rows.push(record.iter().map(|cell| cell.to_string()).collect());
        }

        Ok(Self { headers, rows })
    }

    pub fn cell<'a>(row: &'a [String], index: Option<usize>) -> Option<&'a str> {
        index.and_then(|i| row.get(i)).map(String::as_str)
    }
}

/// UTF-8 first; anything else is read as Latin-1, which maps every byte.
pub fn decode(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Picks the candidate delimiter occurring most often in the header line.
/// Ties go to the earlier candidate; no candidate at all means a comma.
pub fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().find(|line| !line.trim().is_empty()).unwrap_or("");
    let mut best = (b',', 0usize);
    for candidate in DELIMITER_CANDIDATES {
        let count = header.bytes().filter(|b| *b == candidate).count();
        if count > best.1 {
            best = (candidate, count);
        }
    }
    best.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Trimmed, case-insensitive equality. The first matching header wins.
    Exact,
    /// Trimmed, case-insensitive substring containment. Exactly one header
    /// may match.
    Contains,
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub key: &'static str,
    pub aliases: &'static [&'static str],
    pub required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    indices: HashMap<&'static str, usize>,
}

impl ColumnMap {
    pub fn resolve(
        table: &str,
        headers: &[String],
        specs: &[ColumnSpec],
        mode: MatchMode,
    ) -> Result<Self, KiraError> {
        let normalized = headers
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect::<Vec<_>>();

        let mut indices = HashMap::new();
        for spec in specs {
            let matches = normalized
                .iter()
                .enumerate()
                .filter(|(_, header)| match mode {
                    MatchMode::Exact => spec.aliases.iter().any(|alias| header.as_str() == *alias),
                    MatchMode::Contains => spec.aliases.iter().any(|alias| header.contains(alias)),
                })
                .map(|(index, _)| index)
                .collect::<Vec<_>>();

            match (mode, matches.as_slice()) {
                (_, []) => {
                    if spec.required {
                        return Err(KiraError::MissingColumn {
                            table: table.to_string(),
                            column: spec.key.to_string(),
                            expected: spec.aliases.join(", "),
                        });
                    }
                }
                (MatchMode::Contains, [_, _, ..]) => {
                    return Err(KiraError::AmbiguousColumn {
                        table: table.to_string(),
                        column: spec.key.to_string(),
                        candidates: matches
                            .iter()
                            .map(|&i| format!("`{}`", headers[i]))
                            .collect::<Vec<_>>()
                            .join(", "),
                    });
                }
                (_, [first, ..]) => {
                    indices.insert(spec.key, *first);
                }
            }
        }

        Ok(Self { indices })
    }

    pub fn index(&self, key: &str) -> Option<usize> {
        self.indices.get(key).copied()
    }
}
