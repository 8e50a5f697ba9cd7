//! Scout configuration
//!
//! Loaded from YAML. Every field has a default, so an empty file (or no
//! file at all) is a valid configuration:
//!
//! ```yaml
//! database: /var/lib/scout/scout.db
//! logs_dir: .scout/ci-logs
//! concurrency: 4
//! parsers:
//!   default: [markers]
//!   job_patterns:
//!     - pattern: "test.*"
//!       parser: pytest
//!     - pattern: lint
//!       parsers: [flake8]
//! insights:
//!   min_runs: 5
//!   flakiness_threshold: 0.3
//! ```

use crate::insights::InsightOptions;
use crate::parser::{JobPattern, ParserAdapter, ParserRegistry, ParserResolver};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Which parsers run for which jobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserSettings {
    /// Parsers for jobs no pattern matches
    pub default: Vec<String>,
    pub job_patterns: Vec<JobPattern>,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            default: vec!["markers".to_string()],
            job_patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    /// SQLite database holding both stores
    pub database: PathBuf,
    /// Root of the local log directory
    pub logs_dir: PathBuf,
    /// Cases processed at once in a batch
    pub concurrency: usize,
    pub parsers: ParserSettings,
    /// Defaults for `scout insights`
    pub insights: InsightOptions,
}

/// `~/.local/share/scout` (or the platform equivalent)
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"))
        .join("scout")
}

/// `~/.config/scout/config.yaml` (or the platform equivalent)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("scout").join("config.yaml"))
}

impl Default for ScoutConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            database: data_dir.join("scout.db"),
            logs_dir: data_dir.join("ci-logs"),
            concurrency: 1,
            parsers: ParserSettings::default(),
            insights: InsightOptions::default(),
        }
    }
}

impl ScoutConfig {
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        // an empty document deserializes to unit, not a map
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&text)
    }

    /// An explicit path must exist; otherwise the default path is used if
    /// present, and built-in defaults if not.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => match default_config_path() {
                Some(path) if path.exists() => Self::load(path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".into()));
        }
        self.insights
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("insights: {}", e)))?;

        let registry = ParserRegistry::with_builtins();
        let referenced = self
            .parsers
            .default
            .iter()
            .chain(self.parsers.job_patterns.iter().flat_map(|p| p.parsers.iter().chain(p.parser.iter())));
        for name in referenced {
            if !registry.contains(name) {
                return Err(ConfigError::Invalid(format!(
                    "unknown parser '{}' (available: {})",
                    name,
                    registry.names().join(", ")
                )));
            }
        }
        Ok(())
    }

    /// Parser adapter over the built-in parsers, configured by `parsers`
    pub fn parser_adapter(&self) -> ParserAdapter {
        let mut adapter =
            ParserAdapter::new(ParserRegistry::with_builtins()).with_defaults(self.parsers.default.clone());
        if !self.parsers.job_patterns.is_empty() {
            adapter = adapter.with_resolver(ParserResolver::new(self.parsers.job_patterns.clone()));
        }
        adapter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParseHint;
    use std::io::Write;

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(ScoutConfig::from_yaml("").unwrap(), ScoutConfig::default());
        assert_eq!(ScoutConfig::default().concurrency, 1);
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config = ScoutConfig::from_yaml("concurrency: 4\n").unwrap();
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.parsers.default, vec!["markers"]);
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let err = ScoutConfig::from_yaml("concurrency: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_insight_options_merge_and_validate() {
        let config = ScoutConfig::from_yaml("insights:\n  min_runs: 10\n").unwrap();
        assert_eq!(config.insights.min_runs, 10);
        assert_eq!(config.insights.flakiness_threshold, 0.3);

        let err = ScoutConfig::from_yaml("insights:\n  flakiness_threshold: 0.9\n").unwrap_err();
        assert!(err.to_string().contains("flakiness_threshold"));
    }

    #[test]
    fn test_rejects_unknown_parser() {
        let yaml = "parsers:\n  job_patterns:\n    - pattern: test\n      parser: junit\n";
        let err = ScoutConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("junit"));
    }

    #[test]
    fn test_load_from_file_and_build_adapter() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "database: /tmp/scout-test.db\nparsers:\n  default: [markers]\n  job_patterns:\n    - pattern: lint\n      parser: flake8"
        )
        .unwrap();

        let config = ScoutConfig::load_or_default(Some(file.path())).unwrap();
        assert_eq!(config.database, PathBuf::from("/tmp/scout-test.db"));

        let adapter = config.parser_adapter();
        let hint = ParseHint {
            action_name: Some("lint".into()),
        };
        assert_eq!(adapter.resolve_parsers(&hint).unwrap(), vec!["flake8"]);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let err = ScoutConfig::load_or_default(Some(Path::new("/nonexistent/scout.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_malformed_yaml() {
        assert!(matches!(
            ScoutConfig::from_yaml("concurrency: [").unwrap_err(),
            ConfigError::Yaml(_)
        ));
    }
}
