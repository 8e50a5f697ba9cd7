//! CI provider capability

use crate::case::CaseIdentifier;
use crate::storage::Metadata;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Errors from provider listing, fetching and identifier lookups
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("invalid run manifest: {0}")]
    InvalidManifest(String),

    #[error("invalid path component: '{0}'")]
    InvalidName(String),
}

impl From<std::io::Error> for FetchError {
    fn from(err: std::io::Error) -> Self {
        FetchError::Io(err.to_string())
    }
}

/// Raw content returned by a successful fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchedContent {
    pub raw_content: String,
    /// Provider kind, carried into the stored record
    pub content_type: String,
    pub metadata: Metadata,
}

impl FetchedContent {
    pub fn new(raw_content: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            raw_content: raw_content.into(),
            content_type: content_type.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// One case known to the provider, with the creation time of its execution
#[derive(Debug, Clone, PartialEq)]
pub struct CaseListing {
    pub case: CaseIdentifier,
    pub created_at: DateTime<Utc>,
}

impl CaseListing {
    pub fn new(case: CaseIdentifier, created_at: DateTime<Utc>) -> Self {
        Self { case, created_at }
    }
}

/// Source of CI cases and their raw logs.
///
/// Abstracts over where logs come from (local cache, remote API, mock) so
/// the pipeline doesn't depend on how the provider is reached.
#[async_trait]
pub trait CIProvider: Send + Sync {
    /// Short identifier used in logs
    fn id(&self) -> &str;

    /// Every case the provider knows, optionally limited to one workflow.
    ///
    /// Order is unspecified; the fetcher sorts and de-duplicates.
    async fn list_cases(&self, workflow: Option<&str>) -> Result<Vec<CaseListing>, FetchError>;

    /// Fetch raw content for one case
    async fn fetch(&self, case: &CaseIdentifier) -> Result<FetchedContent, FetchError>;
}
