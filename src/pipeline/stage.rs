//! Stages, per-case states and outcomes

use crate::case::{CaseIdentifier, ResolveError, Triple, ValidationError};
use crate::parser::ParseError;
use crate::provider::FetchError;
use crate::storage::StorageError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Resolve,
    Fetch,
    SaveRaw,
    Parse,
    SaveAnalysis,
}

impl Stage {
    /// State a case is in while this stage runs
    pub fn state(&self) -> CaseState {
        match self {
            Stage::Resolve => CaseState::Resolving,
            Stage::Fetch => CaseState::Fetching,
            Stage::SaveRaw => CaseState::SavingRaw,
            Stage::Parse => CaseState::Parsing,
            Stage::SaveAnalysis => CaseState::SavingAnalysis,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Resolve => "resolve",
            Stage::Fetch => "fetch",
            Stage::SaveRaw => "save_raw",
            Stage::Parse => "parse",
            Stage::SaveAnalysis => "save_analysis",
        };
        f.write_str(name)
    }
}

/// Per-case state machine.
///
/// `Resolving → Fetching → SavingRaw → Parsing → SavingAnalysis → Done`;
/// skipped stages are never entered. `Failed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseState {
    Resolving,
    Fetching,
    SavingRaw,
    Parsing,
    SavingAnalysis,
    Done,
    Failed(Stage),
    Cancelled,
}

impl CaseState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CaseState::Done | CaseState::Failed(_) | CaseState::Cancelled)
    }
}

/// A stage could not start because its inputs are missing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("no cached data for {0}")]
    NoCachedData(Triple),

    #[error("no raw content available for {0}")]
    NoRawContent(Triple),

    #[error("{0} is already being processed")]
    AlreadyInFlight(Triple),
}

/// Everything that can fail a case
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Precondition(#[from] PreconditionError),
}

impl From<ResolveError> for PipelineError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Validation(e) => PipelineError::Validation(e),
            ResolveError::Lookup(e) => PipelineError::Fetch(e),
        }
    }
}

/// One failed case, as reported in a batch summary
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct StageFailure {
    pub triple: Triple,
    pub stage: Stage,
    pub reason: String,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed at {}: {}", self.triple, self.stage, self.reason)
    }
}

/// How a case ended
#[derive(Debug)]
pub enum CaseOutcome {
    /// Every stage executed or skipped
    Done,
    Failed { stage: Stage, error: PipelineError },
    /// Stopped before starting the stage after `after` (`None`: never started)
    Cancelled { after: Option<Stage> },
}

/// Result of running one case through the pipeline
#[derive(Debug)]
pub struct CaseResult {
    /// Identifiers after resolution (or as given, if resolution never ran)
    pub case: CaseIdentifier,
    pub outcome: CaseOutcome,
    /// States entered, in order, ending with a terminal state
    pub history: Vec<CaseState>,
    /// Fetch stage executed successfully
    pub fetched: bool,
    /// Parse stage executed successfully
    pub parsed: bool,
    /// Incremental sync reused the stored raw record instead of fetching
    pub reused_raw: bool,
    /// Incremental sync found the case already parsed
    pub already_parsed: bool,
    /// Analysis kinds written to the analysis store
    pub saved_kinds: Vec<String>,
}

impl CaseResult {
    /// A case that never started
    pub fn not_started(case: CaseIdentifier) -> Self {
        Self {
            case,
            outcome: CaseOutcome::Cancelled { after: None },
            history: vec![CaseState::Cancelled],
            fetched: false,
            parsed: false,
            reused_raw: false,
            already_parsed: false,
            saved_kinds: Vec::new(),
        }
    }

    pub fn triple(&self) -> Triple {
        self.case.triple()
    }

    pub fn is_done(&self) -> bool {
        matches!(self.outcome, CaseOutcome::Done)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, CaseOutcome::Failed { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.outcome, CaseOutcome::Cancelled { .. })
    }

    pub fn error(&self) -> Option<&PipelineError> {
        match &self.outcome {
            CaseOutcome::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<StageFailure> {
        match &self.outcome {
            CaseOutcome::Failed { stage, error } => Some(StageFailure {
                triple: self.triple(),
                stage: *stage,
                reason: error.to_string(),
            }),
            _ => None,
        }
    }

    /// Final state of the state machine
    pub fn state(&self) -> CaseState {
        match &self.outcome {
            CaseOutcome::Done => CaseState::Done,
            CaseOutcome::Failed { stage, .. } => CaseState::Failed(*stage),
            CaseOutcome::Cancelled { .. } => CaseState::Cancelled,
        }
    }
}
