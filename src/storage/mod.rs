//! Storage backends for Scout
//!
//! Raw fetched content lives behind `ExecutionStore` and parse results behind
//! `AnalysisStore`. The primary implementation of both is `SqliteStore`.

mod records;
mod sqlite;
mod traits;

pub use records::{AnalysisRecord, ExecutionRecord, Metadata};
pub use sqlite::SqliteStore;
pub use traits::{AnalysisStore, ExecutionStore, OpenStore, StorageError, StorageResult};
