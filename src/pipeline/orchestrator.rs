//! Pipeline orchestrator
//!
//! Sequences Resolve → Fetch → SaveRaw → Parse → SaveAnalysis for one case,
//! and runs batches of cases on a bounded worker pool.

use super::cancel::CancellationToken;
use super::fetcher::Fetcher;
use super::stage::{CaseOutcome, CaseResult, CaseState, PipelineError, PreconditionError, Stage};
use super::summary::BatchSummary;
use crate::case::{
    resolve_case, BatchSelector, CaseIdentifier, IdentifierResolver, IncrementalSync, StageSkipSet, Triple,
};
use crate::parser::{ParseHint, ParsedAnalysis, ParserAdapter};
use crate::provider::{CIProvider, FetchedContent};
use crate::storage::{AnalysisRecord, AnalysisStore, ExecutionRecord, ExecutionStore, Metadata, StorageResult};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Why a case stopped early
enum Halt {
    Failed(Stage, PipelineError),
    Cancelled(Option<Stage>),
}

/// Attach the stage a fallible call belongs to
trait AtStage<T> {
    fn at(self, stage: Stage) -> Result<T, Halt>;
}

impl<T, E: Into<PipelineError>> AtStage<T> for Result<T, E> {
    fn at(self, stage: Stage) -> Result<T, Halt> {
        self.map_err(|e| Halt::Failed(stage, e.into()))
    }
}

/// Where the raw content for this case came from
enum RawSource {
    Fetched(FetchedContent),
    /// Fetch skipped; the stored record satisfied the precondition
    Cached(ExecutionRecord),
}

impl RawSource {
    fn metadata(&self) -> &Metadata {
        match self {
            RawSource::Fetched(content) => &content.metadata,
            RawSource::Cached(record) => &record.metadata,
        }
    }
}

/// Mutable bookkeeping for one case run
struct CaseProgress {
    case: CaseIdentifier,
    history: Vec<CaseState>,
    last_completed: Option<Stage>,
    fetched: bool,
    parsed: bool,
    reused_raw: bool,
    already_parsed: bool,
    saved_kinds: Vec<String>,
}

impl CaseProgress {
    fn new(case: CaseIdentifier) -> Self {
        Self {
            case,
            history: Vec::new(),
            last_completed: None,
            fetched: false,
            parsed: false,
            reused_raw: false,
            already_parsed: false,
            saved_kinds: Vec::new(),
        }
    }

    fn enter(&mut self, stage: Stage, cancel: &CancellationToken) -> Result<(), Halt> {
        if cancel.is_cancelled() {
            return Err(Halt::Cancelled(self.last_completed));
        }
        self.history.push(stage.state());
        Ok(())
    }

    fn complete(&mut self, stage: Stage) {
        self.last_completed = Some(stage);
    }

    fn finish(mut self, outcome: CaseOutcome) -> CaseResult {
        let terminal = match &outcome {
            CaseOutcome::Done => CaseState::Done,
            CaseOutcome::Failed { stage, .. } => CaseState::Failed(*stage),
            CaseOutcome::Cancelled { .. } => CaseState::Cancelled,
        };
        self.history.push(terminal);

        CaseResult {
            case: self.case,
            outcome,
            history: self.history,
            fetched: self.fetched,
            parsed: self.parsed,
            reused_raw: self.reused_raw,
            already_parsed: self.already_parsed,
            saved_kinds: self.saved_kinds,
        }
    }
}

/// Marks a triple as in flight until dropped
struct InFlightGuard {
    in_flight: Arc<DashMap<Triple, ()>>,
    triple: Triple,
}

impl InFlightGuard {
    fn acquire(in_flight: &Arc<DashMap<Triple, ()>>, triple: Triple) -> Option<Self> {
        match in_flight.entry(triple.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(Self {
                    in_flight: Arc::clone(in_flight),
                    triple,
                })
            }
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.triple);
    }
}

/// Everything one worker needs to drive a case; cheap to clone
#[derive(Clone)]
struct StageRunner {
    fetcher: Arc<Fetcher>,
    parser: Arc<ParserAdapter>,
    executions: Arc<dyn ExecutionStore>,
    analyses: Arc<dyn AnalysisStore>,
    resolver: Option<Arc<dyn IdentifierResolver>>,
    incremental: Option<IncrementalSync>,
    in_flight: Arc<DashMap<Triple, ()>>,
    cancel: CancellationToken,
}

impl StageRunner {
    async fn run(&self, case: CaseIdentifier, skips: StageSkipSet) -> CaseResult {
        let mut progress = CaseProgress::new(case);

        let outcome = match self.drive(&mut progress, skips).await {
            Ok(()) => CaseOutcome::Done,
            Err(Halt::Failed(stage, error)) => CaseOutcome::Failed { stage, error },
            Err(Halt::Cancelled(after)) => CaseOutcome::Cancelled { after },
        };

        match &outcome {
            CaseOutcome::Done => tracing::info!(case = %progress.case, "case done"),
            CaseOutcome::Failed { stage, error } => {
                tracing::warn!(case = %progress.case, stage = %stage, error = %error, "case failed")
            }
            CaseOutcome::Cancelled { after } => {
                tracing::info!(case = %progress.case, after = ?after, "case cancelled")
            }
        }

        progress.finish(outcome)
    }

    async fn drive(&self, progress: &mut CaseProgress, skips: StageSkipSet) -> Result<(), Halt> {
        progress.enter(Stage::Resolve, &self.cancel)?;
        let case = match &self.resolver {
            Some(resolver) => resolve_case(&progress.case, resolver.as_ref())
                .await
                .at(Stage::Resolve)?,
            None => progress.case.clone(),
        };
        progress.case = case.clone();
        let triple = case.triple();

        let _guard = InFlightGuard::acquire(&self.in_flight, triple.clone())
            .ok_or_else(|| PreconditionError::AlreadyInFlight(triple.clone()))
            .at(Stage::Resolve)?;
        progress.complete(Stage::Resolve);

        let skips = match self.incremental {
            Some(policy) => {
                let stored = self.executions.load_execution(&triple).at(Stage::Fetch)?;
                let plan = policy.plan(skips, stored.map(|record| record.parsed));
                if plan.reused_raw || plan.already_parsed {
                    tracing::debug!(
                        triple = %triple,
                        reused_raw = plan.reused_raw,
                        already_parsed = plan.already_parsed,
                        "reusing stored results"
                    );
                }
                progress.reused_raw = plan.reused_raw;
                progress.already_parsed = plan.already_parsed;
                plan.skips
            }
            None => skips,
        };

        // Fetch, or satisfy its precondition from the store
        let source = if skips.skip_fetch {
            let cached = self.executions.load_execution(&triple).at(Stage::Fetch)?;
            let record = cached
                .ok_or_else(|| PreconditionError::NoCachedData(triple.clone()))
                .at(Stage::Fetch)?;
            RawSource::Cached(record)
        } else {
            progress.enter(Stage::Fetch, &self.cancel)?;
            let content = self.fetcher.fetch(&case).await.at(Stage::Fetch)?;
            progress.fetched = true;
            progress.complete(Stage::Fetch);
            RawSource::Fetched(content)
        };

        if !skips.skip_save_raw {
            progress.enter(Stage::SaveRaw, &self.cancel)?;
            let record = match &source {
                RawSource::Fetched(content) => {
                    ExecutionRecord::new(case.clone(), content.raw_content.clone(), content.content_type.clone())
                        .with_metadata(content.metadata.clone())
                }
                RawSource::Cached(record) => record.clone(),
            };
            self.executions.save_execution(&record).at(Stage::SaveRaw)?;
            progress.complete(Stage::SaveRaw);
        }

        let mut parsed: Option<Vec<ParsedAnalysis>> = None;
        if !skips.skip_parse {
            progress.enter(Stage::Parse, &self.cancel)?;
            let raw = match &source {
                RawSource::Fetched(content) => content.raw_content.clone(),
                RawSource::Cached(_) => {
                    let record = self
                        .executions
                        .load_execution(&triple)
                        .at(Stage::Parse)?
                        .ok_or_else(|| PreconditionError::NoRawContent(triple.clone()))
                        .at(Stage::Parse)?;
                    record.raw_content
                }
            };
            let hint = ParseHint::for_case(&case);
            parsed = Some(self.parser.parse(&raw, &hint).await.at(Stage::Parse)?);
            progress.parsed = true;
            progress.complete(Stage::Parse);
        }

        // nothing to save when parse was skipped
        if let (false, Some(analyses)) = (skips.skip_save_analysis, parsed) {
            progress.enter(Stage::SaveAnalysis, &self.cancel)?;
            let metadata = source.metadata();
            for analysis in analyses {
                let record =
                    AnalysisRecord::new(case.clone(), analysis.kind, analysis.data).with_metadata(metadata.clone());
                self.analyses.save_analysis(&record).at(Stage::SaveAnalysis)?;
                progress.saved_kinds.push(record.analysis_kind);
            }
            let marked = self.executions.mark_parsed(&triple).at(Stage::SaveAnalysis)?;
            if !marked {
                tracing::debug!(triple = %triple, "no raw record to mark parsed");
            }
            progress.complete(Stage::SaveAnalysis);
        }

        Ok(())
    }
}

/// Drives cases through the ingestion pipeline.
///
/// Collaborators are injected; the orchestrator owns no storage lifecycle.
pub struct PipelineOrchestrator {
    runner: StageRunner,
    /// Maximum cases processed at once within a batch
    concurrency: usize,
}

impl PipelineOrchestrator {
    pub fn new(
        provider: Arc<dyn CIProvider>,
        parser: ParserAdapter,
        executions: Arc<dyn ExecutionStore>,
        analyses: Arc<dyn AnalysisStore>,
    ) -> Self {
        Self {
            runner: StageRunner {
                fetcher: Arc::new(Fetcher::new(provider)),
                parser: Arc::new(parser),
                executions,
                analyses,
                resolver: None,
                incremental: None,
                in_flight: Arc::new(DashMap::new()),
                cancel: CancellationToken::new(),
            },
            concurrency: 1,
        }
    }

    /// Resolve missing identifier halves before each case
    pub fn with_resolver(mut self, resolver: Arc<dyn IdentifierResolver>) -> Self {
        self.runner.resolver = Some(resolver);
        self
    }

    /// Skip stages that stored records already satisfy
    pub fn with_incremental(mut self, policy: IncrementalSync) -> Self {
        self.runner.incremental = Some(policy);
        self
    }

    /// Bound on concurrently processed cases (at least 1)
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.runner.cancel = token;
        self
    }

    /// Token observed between stages; cancel it to stop a running batch
    pub fn cancellation_token(&self) -> CancellationToken {
        self.runner.cancel.clone()
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run one case through every stage not skipped
    pub async fn run_single(&self, case: &CaseIdentifier, skips: StageSkipSet) -> CaseResult {
        self.runner.run(case.clone(), skips).await
    }

    /// Run every case the selector covers. Always returns a summary.
    pub async fn run_batch(&self, selector: &BatchSelector, skips: StageSkipSet) -> BatchSummary {
        let mut summary = BatchSummary::new(selector);
        tracing::info!(
            run_id = %summary.run_id,
            selector = %selector,
            provider = self.runner.fetcher.provider_id(),
            concurrency = self.concurrency,
            "starting batch"
        );

        let cases = match self.runner.fetcher.list(selector).await {
            Ok(cases) => cases,
            Err(e) => {
                tracing::warn!(run_id = %summary.run_id, error = %e, "could not resolve batch");
                summary.batch_failure = Some(e.to_string());
                return summary.finish();
            }
        };

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(cases.len());

        // permits are taken in list order, so cases start oldest first
        for case in cases {
            // a cancel while waiting for a slot ends the wait
            let waited = self
                .runner
                .cancel
                .run_until_cancelled(Arc::clone(&semaphore).acquire_owned())
                .await;
            let Some(Ok(permit)) = waited else {
                summary.record(&CaseResult::not_started(case));
                continue;
            };

            let runner = self.runner.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                runner.run(case, skips).await
            }));
        }

        for handle in handles {
            match handle.await {
                Ok(result) => summary.record(&result),
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(e) => tracing::error!(error = %e, "case worker did not complete"),
            }
        }

        let summary = summary.finish();
        tracing::info!(
            run_id = %summary.run_id,
            total = summary.total,
            fetched = summary.fetched,
            parsed = summary.parsed,
            already_parsed = summary.already_parsed,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "batch finished"
        );
        summary
    }

    pub fn query_execution(&self, triple: &Triple) -> StorageResult<Option<ExecutionRecord>> {
        self.runner.executions.load_execution(triple)
    }

    /// Most recent analysis of any kind
    pub fn query_analysis(&self, triple: &Triple) -> StorageResult<Option<AnalysisRecord>> {
        self.runner.analyses.load_analysis(triple)
    }

    pub fn query_analyses(&self, triple: &Triple) -> StorageResult<Vec<AnalysisRecord>> {
        self.runner.analyses.list_analyses(triple)
    }
}
