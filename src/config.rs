//! Session configuration, read from TOML.
//!
//! Every key is optional. An empty document yields [CatalogConfig::default].
//!
//! ```toml
//! match_mode = "fuzzy"
//! fuzzy_threshold = 0.3
//! debounce_ms = 300
//! invalid_records = "skip"
//! ```

use serde::{Deserialize, Serialize};

#[cfg(not(target_arch = "wasm32"))]
use std::{fs::read_to_string, path::Path};

use crate::error::CatalogError;

pub const DEFAULT_FUZZY_THRESHOLD: f32 = 0.3;
pub const DEFAULT_MAX_QUERY_CHARS: usize = 256;
pub const DEFAULT_DEBOUNCE_MS: u32 = 300;
pub const DEFAULT_UNCATEGORIZED_LABEL: &str = "Uncategorized";
pub const DEFAULT_PATH_SEPARATOR: &str = " → ";

/// How the text matcher decides whether a record matches a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Case-insensitive substring containment on any searchable field.
    #[default]
    Substring,
    /// Approximate substring matching with a length-proportional edit budget. Results are ranked.
    Fuzzy,
}

/// What the record store does with a record that fails validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidRecordPolicy {
    /// Leave the record out and report it in the load report.
    #[default]
    Skip,
    /// Fail the whole load on the first invalid record.
    Abort,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub match_mode: MatchMode,
    /// Fraction of the query length that may be edited in [MatchMode::Fuzzy]. `0.0` only accepts
    /// exact substrings.
    pub fuzzy_threshold: f32,
    /// Queries are truncated to this many characters before matching.
    pub max_query_chars: usize,
    /// Window used by [crate::debounce::QueryDebouncer] to collapse bursts of query edits.
    pub debounce_ms: u32,
    pub uncategorized_label: String,
    /// Separator used to split `gpPath`/`parentCategory` strings and to render node keys.
    pub path_separator: String,
    pub invalid_records: InvalidRecordPolicy,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        CatalogConfig {
            match_mode: MatchMode::default(),
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            max_query_chars: DEFAULT_MAX_QUERY_CHARS,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            uncategorized_label: DEFAULT_UNCATEGORIZED_LABEL.to_string(),
            path_separator: DEFAULT_PATH_SEPARATOR.to_string(),
            invalid_records: InvalidRecordPolicy::default(),
        }
    }
}

impl CatalogConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, CatalogError> {
        let config: CatalogConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        tracing::debug!("Reading catalog config from: {:?}", path.as_ref());
        let content = read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        if !(0.0..=1.0).contains(&self.fuzzy_threshold) {
            return Err(CatalogError::Config(format!(
                "fuzzy_threshold must be within [0, 1], got {}",
                self.fuzzy_threshold
            )));
        }
        if self.max_query_chars == 0 {
            return Err(CatalogError::Config(
                "max_query_chars must be greater than zero".to_string(),
            ));
        }
        if self.uncategorized_label.trim().is_empty() {
            return Err(CatalogError::Config(
                "uncategorized_label must not be blank".to_string(),
            ));
        }
        if self.path_separator.is_empty() {
            return Err(CatalogError::Config(
                "path_separator must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use test_log::test;

    #[test]
    fn test_empty_document_is_default() {
        let config = CatalogConfig::from_toml_str("").unwrap();
        assert_eq!(config, CatalogConfig::default());
        assert_eq!(config.debounce_ms, 300);
        assert_eq!(config.match_mode, MatchMode::Substring);
    }

    #[test]
    fn test_partial_document_keeps_other_defaults() {
        let config = CatalogConfig::from_toml_str(
            r#"
match_mode = "fuzzy"
invalid_records = "abort"
"#,
        )
        .unwrap();
        assert_eq!(config.match_mode, MatchMode::Fuzzy);
        assert_eq!(config.invalid_records, InvalidRecordPolicy::Abort);
        assert_eq!(config.uncategorized_label, "Uncategorized");
    }

    #[test]
    fn test_out_of_range_threshold_is_rejected() {
        let err = CatalogConfig::from_toml_str("fuzzy_threshold = 1.5").unwrap_err();
        assert!(matches!(err, CatalogError::Config(_)));
    }

    #[test]
    fn test_unknown_mode_is_a_config_error() {
        let err = CatalogConfig::from_toml_str(r#"match_mode = "regex""#).unwrap_err();
        assert!(matches!(err, CatalogError::Config(_)));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "debounce_ms = 120").unwrap();
        let config = CatalogConfig::from_path(file.path()).unwrap();
        assert_eq!(config.debounce_ms, 120);

        let missing = CatalogConfig::from_path(file.path().with_extension("missing"));
        assert!(matches!(missing, Err(CatalogError::NotFound(_))));
    }
}
