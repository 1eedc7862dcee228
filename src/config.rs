//! Process-wide settings.
//!
//! Built once at startup (CLI flags with environment fallbacks) and passed by
//! value into the upstream client and the classifier.

use crate::classifier::ACADEMIC_KEYWORDS;
use crate::error::{AffilscanError, Result};
use std::path::PathBuf;

/// Public E-utilities search endpoint
pub const DEFAULT_ESEARCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi";

/// Public E-utilities fetch endpoint
pub const DEFAULT_EFETCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi";

/// Maximum identifiers taken from one search
pub const DEFAULT_MAX_RESULTS: usize = 10;

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct Settings {
    /// NCBI API key, sent with every upstream call when set
    pub api_key: Option<String>,
    /// Search endpoint URL
    pub esearch_url: String,
    /// Detail endpoint URL
    pub efetch_url: String,
    /// Cap on identifiers returned by a search
    pub max_results: usize,
    /// SQLite database file
    pub database_path: PathBuf,
    /// Academic keyword denylist
    pub academic_keywords: Vec<String>,
}

impl Settings {
    /// Check values that would otherwise fail later at request time.
    pub fn validate(&self) -> Result<()> {
        if self.max_results == 0 {
            return Err(AffilscanError::Config(
                "max_results must be at least 1".to_string(),
            ));
        }
        for endpoint in [&self.esearch_url, &self.efetch_url] {
            url::Url::parse(endpoint).map_err(|e| {
                AffilscanError::Config(format!("Invalid endpoint URL '{}': {}", endpoint, e))
            })?;
        }
        if self.academic_keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(AffilscanError::Config(
                "academic keywords must not be blank".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            esearch_url: DEFAULT_ESEARCH_URL.to_string(),
            efetch_url: DEFAULT_EFETCH_URL.to_string(),
            max_results: DEFAULT_MAX_RESULTS,
            database_path: default_database_path(),
            academic_keywords: ACADEMIC_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Default database path: `<data dir>/affilscan/affilscan.db`
pub fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join("affilscan").join("affilscan.db"))
        .unwrap_or_else(|| PathBuf::from("affilscan.db"))
}
