//! Batch selection and per-stage skip configuration

use super::identifier::{CaseIdentifier, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which cases a batch run covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchSelector {
    /// Exactly one case
    Single(CaseIdentifier),
    /// Every case the provider knows, optionally for one workflow
    All { workflow: Option<String> },
    /// The `n` most recent cases, optionally for one workflow
    LastN { n: usize, workflow: Option<String> },
}

impl BatchSelector {
    pub fn single(case: CaseIdentifier) -> Self {
        BatchSelector::Single(case)
    }

    pub fn all(workflow: Option<String>) -> Self {
        BatchSelector::All { workflow }
    }

    /// `LastN` selector; `n` must be positive
    pub fn last_n(n: usize, workflow: Option<String>) -> Result<Self, ValidationError> {
        if n == 0 {
            return Err(ValidationError::InvalidBatchSize);
        }
        Ok(BatchSelector::LastN { n, workflow })
    }

    /// Workflow name filter, if any
    pub fn workflow(&self) -> Option<&str> {
        match self {
            BatchSelector::Single(case) => Some(case.workflow_name()),
            BatchSelector::All { workflow } | BatchSelector::LastN { workflow, .. } => {
                workflow.as_deref()
            }
        }
    }
}

impl fmt::Display for BatchSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let filter = |w: &Option<String>| match w {
            Some(name) => format!(" from workflow '{}'", name),
            None => String::new(),
        };
        match self {
            BatchSelector::Single(case) => write!(f, "{}", case),
            BatchSelector::All { workflow } => write!(f, "all cases{}", filter(workflow)),
            BatchSelector::LastN { n, workflow } => {
                write!(f, "last {} cases{}", n, filter(workflow))
            }
        }
    }
}

/// Independent skip flags for the four pipeline stages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSkipSet {
    pub skip_fetch: bool,
    pub skip_save_raw: bool,
    pub skip_parse: bool,
    pub skip_save_analysis: bool,
}

impl StageSkipSet {
    /// Run every stage
    pub fn none() -> Self {
        Self::default()
    }

    /// Re-parse from stored raw content without touching the provider
    pub fn reparse() -> Self {
        Self {
            skip_fetch: true,
            skip_save_raw: true,
            ..Self::default()
        }
    }

    pub fn with_skip_fetch(mut self) -> Self {
        self.skip_fetch = true;
        self
    }

    pub fn with_skip_save_raw(mut self) -> Self {
        self.skip_save_raw = true;
        self
    }

    pub fn with_skip_parse(mut self) -> Self {
        self.skip_parse = true;
        self
    }

    pub fn with_skip_save_analysis(mut self) -> Self {
        self.skip_save_analysis = true;
        self
    }

    pub fn is_all_skipped(&self) -> bool {
        self.skip_fetch && self.skip_save_raw && self.skip_parse && self.skip_save_analysis
    }
}

/// Reuse what earlier runs stored.
///
/// A stored raw record stands in for Fetch and SaveRaw, and a record already
/// marked parsed stands in for Parse and SaveAnalysis. Either can be forced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncrementalSync {
    /// Fetch and store again even when a raw record exists
    pub force_download: bool,
    /// Parse again even when the stored record is already parsed
    pub force_parse: bool,
}

/// Effective skips for one case under [`IncrementalSync`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncrementalPlan {
    pub skips: StageSkipSet,
    /// Fetch was satisfied by the stored raw record
    pub reused_raw: bool,
    /// Parse was satisfied by an earlier analysis
    pub already_parsed: bool,
}

impl IncrementalSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_force_download(mut self) -> Self {
        self.force_download = true;
        self
    }

    pub fn with_force_parse(mut self) -> Self {
        self.force_parse = true;
        self
    }

    /// `stored_parsed` is the stored record's `parsed` flag, `None` if there is no record
    pub fn plan(&self, mut skips: StageSkipSet, stored_parsed: Option<bool>) -> IncrementalPlan {
        let Some(parsed) = stored_parsed else {
            return IncrementalPlan {
                skips,
                reused_raw: false,
                already_parsed: false,
            };
        };

        let reused_raw = !self.force_download && !skips.skip_fetch;
        if reused_raw {
            skips.skip_fetch = true;
            skips.skip_save_raw = true;
        }
        let already_parsed = parsed && !self.force_parse && !skips.skip_parse;
        if already_parsed {
            skips.skip_parse = true;
            skips.skip_save_analysis = true;
        }

        IncrementalPlan {
            skips,
            reused_raw,
            already_parsed,
        }
    }
}
