//! Job-name based parser selection
//!
//! Maps job names to parser names using ordered patterns. Patterns are
//! regular expressions anchored at the start of the job name; a pattern that
//! fails to compile is compared as an exact string instead.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

/// One job-to-parser mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPattern {
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parser: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parsers: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl JobPattern {
    pub fn new(pattern: impl Into<String>, parser: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            parser: Some(parser.into()),
            parsers: Vec::new(),
            description: String::new(),
            enabled: true,
        }
    }

    pub fn with_parsers(pattern: impl Into<String>, parsers: Vec<String>) -> Self {
        Self {
            pattern: pattern.into(),
            parser: None,
            parsers,
            description: String::new(),
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// `parsers` wins over `parser` when both are set
    pub fn parser_names(&self) -> Vec<String> {
        if !self.parsers.is_empty() {
            self.parsers.clone()
        } else {
            self.parser.iter().cloned().collect()
        }
    }
}

/// Top-level shape of a standalone parser config file
#[derive(Debug, Default, Deserialize)]
struct ParserConfigFile {
    #[serde(default)]
    job_patterns: Vec<JobPattern>,
}

#[derive(Debug, Clone)]
struct CompiledPattern {
    config: JobPattern,
    regex: Option<Regex>,
}

impl CompiledPattern {
    fn matches(&self, job_name: &str) -> bool {
        match &self.regex {
            Some(regex) => regex.is_match(job_name),
            None => self.config.pattern == job_name,
        }
    }
}

/// Resolves parser names for a job name
#[derive(Debug, Clone, Default)]
pub struct ParserResolver {
    patterns: Vec<CompiledPattern>,
}

impl ParserResolver {
    pub fn new(patterns: Vec<JobPattern>) -> Self {
        let patterns = patterns
            .into_iter()
            .map(|config| {
                let regex = match Regex::new(&format!("^(?:{})", config.pattern)) {
                    Ok(regex) => Some(regex),
                    Err(e) => {
                        tracing::warn!(pattern = %config.pattern, error = %e, "invalid job pattern, using exact match");
                        None
                    }
                };
                CompiledPattern { config, regex }
            })
            .collect();
        Self { patterns }
    }

    /// Load from YAML with a top-level `job_patterns` list
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        let file: ParserConfigFile = serde_yaml::from_str(text)?;
        Ok(Self::new(file.job_patterns))
    }

    /// Parser names for the first enabled pattern matching `job_name`.
    ///
    /// A matching pattern with no parser names yields `None`.
    pub fn resolve(&self, job_name: &str) -> Option<Vec<String>> {
        let matched = self
            .patterns
            .iter()
            .filter(|p| p.config.enabled)
            .find(|p| p.matches(job_name))?;

        let names = matched.config.parser_names();
        (!names.is_empty()).then_some(names)
    }

    pub fn patterns(&self) -> impl Iterator<Item = &JobPattern> {
        self.patterns.iter().map(|p| &p.config)
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
