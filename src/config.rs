//! Search configuration with sensible defaults.
//!
//! [`SearchConfig`] controls the per-source page size, the time budget of
//! the concurrent fan-out, the retry hint handed out with refresh tokens,
//! and which ranker orders the merged results. It can be loaded from and
//! saved to TOML.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SearchError;
use crate::ranking::RankerKind;
use crate::types::SearchFilter;

/// Configuration for a package feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Maximum items requested from each source per page.
    pub page_size: usize,
    /// Wall-clock budget in milliseconds for the per-source calls of one
    /// request. Sources still running afterwards are handed back in a
    /// refresh token, not cancelled.
    pub timeout_ms: u64,
    /// Suggested delay in milliseconds before refreshing a partial result.
    pub refresh_delay_ms: u64,
    /// Ranker used to merge per-source results.
    pub ranker: RankerKind,
    /// Filter applied when the caller does not supply one.
    pub filter: SearchFilter,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            page_size: 25,
            timeout_ms: 5_000,
            refresh_delay_ms: 100,
            ranker: RankerKind::Relevance,
            filter: SearchFilter::default(),
        }
    }
}

impl SearchConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - `page_size` must be greater than 0
    /// - `timeout_ms` must be greater than 0
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.page_size == 0 {
            return Err(SearchError::Config(
                "page_size must be greater than 0".into(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(SearchError::Config(
                "timeout_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// The fan-out time budget.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The refresh retry hint.
    pub fn refresh_delay(&self) -> Duration {
        Duration::from_millis(self.refresh_delay_ms)
    }

    /// Parse and validate a TOML document; missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if the document cannot be parsed or
    /// fails validation.
    pub fn from_toml_str(content: &str) -> Result<Self, SearchError> {
        let config: Self = toml::from_str(content).map_err(|e| SearchError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self, SearchError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<(), SearchError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| SearchError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sensible_values() {
        let config = SearchConfig::default();
        assert_eq!(config.page_size, 25);
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.refresh_delay(), Duration::from_millis(100));
        assert_eq!(config.ranker, RankerKind::Relevance);
        assert!(!config.filter.include_prerelease);
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(SearchConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_page_size_rejected() {
        let config = SearchConfig {
            page_size: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("page_size"));
    }

    #[test]
    fn zero_timeout_rejected() {
        let config = SearchConfig {
            timeout_ms: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("timeout_ms"));
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config = SearchConfig::from_toml_str(
            r#"
            page_size = 50
            ranker = "popularity"

            [filter]
            include_prerelease = true
            "#,
        )
        .expect("parse");
        assert_eq!(config.page_size, 50);
        assert_eq!(config.ranker, RankerKind::Popularity);
        assert!(config.filter.include_prerelease);
        assert_eq!(config.timeout_ms, 5_000);
    }

    #[test]
    fn invalid_toml_values_rejected() {
        assert!(SearchConfig::from_toml_str("page_size = 0").is_err());
        assert!(SearchConfig::from_toml_str("ranker = \"random\"").is_err());
        assert!(SearchConfig::from_toml_str("page_size = [").is_err());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("search.toml");
        let config = SearchConfig {
            timeout_ms: 750,
            ranker: RankerKind::Popularity,
            ..Default::default()
        };
        config.save_to_file(&path).expect("save");
        let loaded = SearchConfig::from_file(&path).expect("load");
        assert_eq!(loaded, config);
    }
}
