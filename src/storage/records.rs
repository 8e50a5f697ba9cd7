//! Persisted record shapes

use crate::case::{CaseIdentifier, Triple};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Free-form string metadata (status, conclusion, branch, ...)
pub type Metadata = BTreeMap<String, String>;

/// Raw fetched content for one case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Identifiers the record was stored under (resolved where possible)
    pub case: CaseIdentifier,
    pub raw_content: String,
    /// Provider / content kind, e.g. "github_actions"
    pub content_type: String,
    pub stored_at: DateTime<Utc>,
    /// True once an analysis has been saved for the same triple
    pub parsed: bool,
    pub metadata: Metadata,
}

impl ExecutionRecord {
    pub fn new(case: CaseIdentifier, raw_content: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            case,
            raw_content: raw_content.into(),
            content_type: content_type.into(),
            stored_at: Utc::now(),
            parsed: false,
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn triple(&self) -> Triple {
        self.case.triple()
    }
}

/// Structured parse result for one case and one analysis kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub case: CaseIdentifier,
    /// Name of the parser that produced the data
    pub analysis_kind: String,
    pub parsed_data: serde_json::Value,
    pub parsed_at: DateTime<Utc>,
    pub metadata: Metadata,
}

impl AnalysisRecord {
    pub fn new(case: CaseIdentifier, analysis_kind: impl Into<String>, parsed_data: serde_json::Value) -> Self {
        Self {
            case,
            analysis_kind: analysis_kind.into(),
            parsed_data,
            parsed_at: Utc::now(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn triple(&self) -> Triple {
        self.case.triple()
    }
}
