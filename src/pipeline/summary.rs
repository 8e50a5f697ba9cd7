//! Batch summaries

use super::stage::{CaseResult, StageFailure};
use crate::case::BatchSelector;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Counts and failures for one batch run.
///
/// A batch always produces a summary; per-case errors are collected here
/// rather than aborting the run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub run_id: Uuid,
    /// Human-readable selector description
    pub selector: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Cases the selector resolved to
    pub total: usize,
    pub fetched: usize,
    pub parsed: usize,
    /// Cases whose stored raw record stood in for a fetch
    pub reused_raw: usize,
    /// Cases skipped because they were already parsed
    pub already_parsed: usize,
    pub failed: usize,
    pub completed: usize,
    pub cancelled: usize,
    /// Sorted by triple
    pub failures: Vec<StageFailure>,
    /// Set when the batch could not be resolved into cases at all
    pub batch_failure: Option<String>,
}

impl BatchSummary {
    pub fn new(selector: &BatchSelector) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            selector: selector.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            total: 0,
            fetched: 0,
            parsed: 0,
            reused_raw: 0,
            already_parsed: 0,
            failed: 0,
            completed: 0,
            cancelled: 0,
            failures: Vec::new(),
            batch_failure: None,
        }
    }

    /// Tally one finished case
    pub fn record(&mut self, result: &CaseResult) {
        self.total += 1;
        if result.fetched {
            self.fetched += 1;
        }
        if result.parsed {
            self.parsed += 1;
        }
        if result.reused_raw {
            self.reused_raw += 1;
        }
        if result.already_parsed {
            self.already_parsed += 1;
        }

        if let Some(failure) = result.failure() {
            self.failed += 1;
            self.failures.push(failure);
        } else if result.is_cancelled() {
            self.cancelled += 1;
        } else {
            self.completed += 1;
        }
    }

    /// Seal the summary: sort failures and stamp the finish time
    pub fn finish(mut self) -> Self {
        self.failures.sort();
        self.finished_at = Some(Utc::now());
        self
    }

    /// No case failed and the batch itself resolved
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.batch_failure.is_none()
    }
}
