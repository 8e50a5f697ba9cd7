//! Orchestrator wired to a `MockProvider` and an in-memory `SqliteStore`

use chrono::{DateTime, Duration, TimeZone, Utc};
use scout::{CaseIdentifier, IncrementalSync, MockProvider, OpenStore, ParserAdapter, PipelineOrchestrator, SqliteStore};
use std::sync::Arc;

pub struct Harness {
    pub orchestrator: PipelineOrchestrator,
    pub provider: Arc<MockProvider>,
    pub store: Arc<SqliteStore>,
}

impl Harness {
    /// Orchestrator with the built-in parsers and the provider as resolver
    pub fn new(provider: MockProvider) -> Self {
        Self::with_adapter(provider, ParserAdapter::builtin())
    }

    pub fn with_adapter(provider: MockProvider, adapter: ParserAdapter) -> Self {
        let provider = Arc::new(provider);
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let orchestrator =
            PipelineOrchestrator::new(provider.clone(), adapter, store.clone(), store.clone())
                .with_resolver(provider.clone());
        Self {
            orchestrator,
            provider,
            store,
        }
    }

    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.orchestrator = self.orchestrator.with_concurrency(limit);
        self
    }

    pub fn with_incremental(mut self, policy: IncrementalSync) -> Self {
        self.orchestrator = self.orchestrator.with_incremental(policy);
        self
    }
}

/// `("CI Tests", run_id, job_id)`
pub fn case(run_id: i64, job_id: &str) -> CaseIdentifier {
    CaseIdentifier::with_ids("CI Tests", run_id, job_id).unwrap()
}

/// Fixed timestamps so listing order doesn't depend on the clock
pub fn minutes_after_epoch(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
}
