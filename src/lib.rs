//! Scout: CI ingestion pipeline
//!
//! Ingests CI execution records from a provider, persists raw logs and
//! parsed analyses, and keeps both queryable for failure and flakiness
//! analysis (see [`insights`]).
//!
//! # Core Concepts
//!
//! - **Cases**: one job in one execution of one workflow, keyed by a triple
//! - **Stores**: raw content (`ExecutionStore`) and parse results (`AnalysisStore`)
//! - **Pipeline**: Fetch → SaveRaw → Parse → SaveAnalysis, each stage skippable
//!
//! # Example
//!
//! ```
//! use scout::{CaseIdentifier, Triple};
//!
//! let case = CaseIdentifier::with_ids("CI Tests", 12345, "abc").unwrap();
//! assert_eq!(case.triple(), Triple::new("CI Tests", 12345, "abc"));
//! ```

pub mod case;
pub mod config;
pub mod insights;
pub mod logging;
pub mod parser;
pub mod pipeline;
pub mod provider;
pub mod storage;

pub use case::{
    BatchSelector, CaseIdentifier, ExecutionRef, IncrementalSync, JobRef, StageSkipSet, Triple, ValidationError,
};
pub use config::{ConfigError, ParserSettings, ScoutConfig};
pub use insights::{collect_insights, FlakyTest, InsightError, InsightOptions, Insights, RecurringFailure};
pub use parser::{LogParser, ParseError, ParseHint, ParserAdapter, ParserRegistry, ParserResolver};
pub use pipeline::{
    BatchSummary, CancellationToken, CaseOutcome, CaseResult, CaseState, PipelineError, PipelineOrchestrator,
    PreconditionError, Stage, StageFailure,
};
pub use provider::{CIProvider, FetchError, FetchedContent, LocalLogProvider, MockProvider};
pub use storage::{
    AnalysisRecord, AnalysisStore, ExecutionRecord, ExecutionStore, OpenStore, SqliteStore, StorageError,
    StorageResult,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
