use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::error::KiraError;

pub const DEFAULT_BASE_URL: &str = "https://rest.uniprot.org/uniprotkb/stream";
/// UniProt keyword "Virulence".
pub const DEFAULT_KEYWORD: &str = "KW-0843";

/// Source of candidate virulence genes for one organism. Implementations
/// return the raw tab-separated body; a non-success response is an error.
pub trait AnnotationClient: Send + Sync {
    fn fetch_organism(&self, organism_id: &str, keyword: &str) -> Result<String, KiraError>;
}

#[derive(Clone)]
pub struct UniprotAnnotationClient {
    client: Client,
    base_url: String,
}

impl UniprotAnnotationClient {
    pub fn new(base_url: &str) -> Result<Self, KiraError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-vf/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| KiraError::AnnotationHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| KiraError::AnnotationHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    fn query(organism_id: &str, keyword: &str) -> String {
        format!("organism_id:{organism_id} AND keyword:{keyword}")
    }
}

impl AnnotationClient for UniprotAnnotationClient {
    fn fetch_organism(&self, organism_id: &str, keyword: &str) -> Result<String, KiraError> {
        let query = Self::query(organism_id, keyword);
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("query", query.as_str()),
                ("format", "tsv"),
                ("fields", "accession,gene_names"),
            ])
            .send()
            .map_err(|err| KiraError::AnnotationHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "annotation request failed".to_string());
            return Err(KiraError::AnnotationStatus { status, message });
        }
        response
            .text()
            .map_err(|err| KiraError::AnnotationHttp(err.to_string()))
    }
}

/// Extracts gene aliases from a tab-separated response: the header line is
/// dropped and the second field of every row holds space-separated names.
pub fn parse_gene_aliases(body: &str) -> Vec<String> {
    body.lines()
        .skip(1)
        .filter_map(|line| line.split('\t').nth(1))
        .flat_map(|field| field.split_whitespace())
        .map(|alias| alias.to_string())
        .collect()
}
