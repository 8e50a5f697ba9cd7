//! The four-stage ingestion pipeline
//!
//! Fetch → SaveRaw → Parse → SaveAnalysis, preceded by identifier
//! resolution. Each stage can be skipped independently; a batch runs many
//! cases on a bounded worker pool and always returns a [`BatchSummary`].

mod cancel;
mod fetcher;
mod orchestrator;
mod stage;
mod summary;

pub use cancel::CancellationToken;
pub use fetcher::{order_listings, Fetcher};
pub use orchestrator::PipelineOrchestrator;
pub use stage::{CaseOutcome, CaseResult, CaseState, PipelineError, PreconditionError, Stage, StageFailure};
pub use summary::BatchSummary;
