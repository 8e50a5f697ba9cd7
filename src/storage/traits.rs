//! Storage trait definitions

use super::records::{AnalysisRecord, ExecutionRecord};
use crate::case::Triple;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    DateParse(String),

    #[error("Invalid stored key: {0}")]
    InvalidKey(String),

    #[error("Connection lock poisoned")]
    LockPoisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable store of raw fetched content, one record per triple.
///
/// Implementations must be thread-safe (Send + Sync); concurrent saves to
/// different triples must not interfere, and concurrent saves to the same
/// triple resolve last-writer-wins.
pub trait ExecutionStore: Send + Sync {
    /// Save a record, replacing any existing record for its triple.
    /// A stored `parsed = true` is kept: it only ever flips false to true.
    fn save_execution(&self, record: &ExecutionRecord) -> StorageResult<()>;

    /// Load the record for a triple
    fn load_execution(&self, triple: &Triple) -> StorageResult<Option<ExecutionRecord>>;

    /// Most recently stored records first
    fn list_recent_executions(
        &self,
        workflow: Option<&str>,
        limit: usize,
    ) -> StorageResult<Vec<ExecutionRecord>>;

    /// Set `parsed = true`. Returns false if no record exists for the triple.
    fn mark_parsed(&self, triple: &Triple) -> StorageResult<bool>;
}

/// Durable store of parse results, one record per `(triple, analysis_kind)`
pub trait AnalysisStore: Send + Sync {
    /// Save a record, replacing any existing record with the same triple and kind
    fn save_analysis(&self, record: &AnalysisRecord) -> StorageResult<()>;

    /// The most recently parsed record for a triple, of any kind
    fn load_analysis(&self, triple: &Triple) -> StorageResult<Option<AnalysisRecord>>;

    /// The record for a triple and a specific analysis kind
    fn load_analysis_kind(&self, triple: &Triple, kind: &str) -> StorageResult<Option<AnalysisRecord>>;

    /// Every record for a triple, ordered by kind
    fn list_analyses(&self, triple: &Triple) -> StorageResult<Vec<AnalysisRecord>>;

    /// Most recently parsed records first
    fn list_recent_analyses(
        &self,
        workflow: Option<&str>,
        limit: usize,
    ) -> StorageResult<Vec<AnalysisRecord>>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
