//! Mock provider for testing: returns preconfigured listings and logs

use super::traits::{CIProvider, CaseListing, FetchError, FetchedContent};
use crate::case::{CaseIdentifier, ExecutionPair, ExecutionRef, IdentifierResolver, JobPair, JobRef, Triple};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const MOCK_CONTENT_TYPE: &str = "mock";

/// In-memory `CIProvider` and `IdentifierResolver`.
///
/// Counts calls so tests can assert that skipped stages never reach the
/// provider.
#[derive(Default)]
pub struct MockProvider {
    listings: Vec<CaseListing>,
    responses: HashMap<Triple, Result<FetchedContent, FetchError>>,
    listing_failure: Option<FetchError>,
    runs: Vec<ExecutionPair>,
    jobs: Vec<JobPair>,
    fetch_delay: Option<Duration>,
    fetch_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// List a case and serve `raw` for it
    pub fn with_log(mut self, case: CaseIdentifier, created_at: DateTime<Utc>, raw: impl Into<String>) -> Self {
        self.responses
            .insert(case.triple(), Ok(FetchedContent::new(raw, MOCK_CONTENT_TYPE)));
        self.listings.push(CaseListing::new(case, created_at));
        self
    }

    /// List a case whose fetch fails with `error`
    pub fn with_failure(mut self, case: CaseIdentifier, created_at: DateTime<Utc>, error: FetchError) -> Self {
        self.responses.insert(case.triple(), Err(error));
        self.listings.push(CaseListing::new(case, created_at));
        self
    }

    /// Make `list_cases` fail
    pub fn with_listing_failure(mut self, error: FetchError) -> Self {
        self.listing_failure = Some(error);
        self
    }

    /// Register a run id ↔ run number mapping for identifier lookups
    pub fn with_run(mut self, run_id: i64, run_number: i64) -> Self {
        self.runs.push(ExecutionPair {
            run_id,
            run_number: Some(run_number),
        });
        self
    }

    /// Register a job id ↔ action name mapping for identifier lookups
    pub fn with_job(mut self, job_id: impl Into<String>, action_name: impl Into<String>) -> Self {
        self.jobs.push(JobPair {
            job_id: job_id.into(),
            action_name: Some(action_name.into()),
        });
        self
    }

    /// Sleep before answering each fetch
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn list_count(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CIProvider for MockProvider {
    fn id(&self) -> &str {
        "mock"
    }

    async fn list_cases(&self, workflow: Option<&str>) -> Result<Vec<CaseListing>, FetchError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.listing_failure {
            return Err(err.clone());
        }

        Ok(self
            .listings
            .iter()
            .filter(|l| workflow.map_or(true, |w| l.case.workflow_name() == w))
            .cloned()
            .collect())
    }

    async fn fetch(&self, case: &CaseIdentifier) -> Result<FetchedContent, FetchError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }

        match self.responses.get(&case.triple()) {
            Some(response) => response.clone(),
            None => Err(FetchError::NotFound(format!("no mock log for {}", case))),
        }
    }
}

#[async_trait]
impl IdentifierResolver for MockProvider {
    async fn lookup_execution(
        &self,
        _workflow_name: &str,
        execution: ExecutionRef,
    ) -> Result<Option<ExecutionPair>, FetchError> {
        Ok(self
            .runs
            .iter()
            .find(|pair| match execution {
                ExecutionRef::Id(id) => pair.run_id == id,
                ExecutionRef::Number(n) => pair.run_number == Some(n),
            })
            .copied())
    }

    async fn lookup_job(
        &self,
        _workflow_name: &str,
        _run_id: Option<i64>,
        job: &JobRef,
    ) -> Result<Option<JobPair>, FetchError> {
        Ok(self
            .jobs
            .iter()
            .find(|pair| match job {
                JobRef::Id(id) => &pair.job_id == id,
                JobRef::Action(name) => pair.action_name.as_deref() == Some(name.as_str()),
            })
            .cloned())
    }
}
