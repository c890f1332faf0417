use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::annotation::{DEFAULT_BASE_URL, DEFAULT_KEYWORD};
use crate::domain::{GramAffinity, Organism};
use crate::error::KiraError;

pub const CONFIG_FILE: &str = "kira-vf.json";
pub const DEFAULT_REFERENCE_PATH: &str = "base_virulencia.csv";
pub const DEFAULT_MANUAL_PATH: &str = "base_virulencia_manual.csv";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub reference_path: Option<String>,
    #[serde(default)]
    pub manual_path: Option<String>,
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub organisms: Option<Vec<OrganismEntry>>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum OrganismEntry {
    Shorthand(String),
    Detailed(Organism),
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub reference_path: Utf8PathBuf,
    pub manual_path: Option<Utf8PathBuf>,
    pub keyword: String,
    pub base_url: String,
    pub organisms: Vec<Organism>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Explicit path, then `./kira-vf.json`, then the user config directory.
    /// With none of them present the built-in defaults apply.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, KiraError> {
        let config_path = match path {
            Some(path) => Some(PathBuf::from(path)),
            None => Self::discover(),
        };

        let Some(config_path) = config_path else {
            return Self::resolve_config(Config::default());
        };

        let content = fs::read_to_string(&config_path)
            .map_err(|_| KiraError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| KiraError::ConfigParse(err.to_string()))?;
        tracing::debug!(path = %config_path.display(), "config loaded");

        Self::resolve_config(config)
    }

    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        BaseDirs::new()
            .map(|dirs| dirs.config_dir().join("kira-vf").join(CONFIG_FILE))
            .filter(|path| path.exists())
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, KiraError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let organisms = match config.organisms {
            Some(entries) => entries
                .into_iter()
                .map(|entry| match entry {
                    OrganismEntry::Shorthand(value) => value.parse(),
                    OrganismEntry::Detailed(organism) => Ok(organism),
                })
                .collect::<Result<Vec<_>, KiraError>>()?,
            None => default_organisms(),
        };

        let manual_path = match config.manual_path {
            Some(path) if path.trim().is_empty() => None,
            Some(path) => Some(Utf8PathBuf::from(path)),
            None => Some(Utf8PathBuf::from(DEFAULT_MANUAL_PATH)),
        };

        Ok(ResolvedConfig {
            schema_version,
            reference_path: Utf8PathBuf::from(
                config
                    .reference_path
                    .unwrap_or_else(|| DEFAULT_REFERENCE_PATH.to_string()),
            ),
            manual_path,
            keyword: config.keyword.unwrap_or_else(|| DEFAULT_KEYWORD.to_string()),
            base_url: config.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            organisms,
        })
    }
}

pub fn default_organisms() -> Vec<Organism> {
    vec![
        Organism::new("562", GramAffinity::Neg, "Escherichia coli"),
        Organism::new("28901", GramAffinity::Neg, "Salmonella enterica"),
        Organism::new("573", GramAffinity::Neg, "Klebsiella pneumoniae"),
        Organism::new("287", GramAffinity::Neg, "Pseudomonas aeruginosa"),
        Organism::new("1280", GramAffinity::Pos, "Staphylococcus aureus"),
        Organism::new("1313", GramAffinity::Pos, "Streptococcus pneumoniae"),
        Organism::new("1639", GramAffinity::Pos, "Listeria monocytogenes"),
        Organism::new("1396", GramAffinity::Pos, "Bacillus cereus"),
    ]
}
