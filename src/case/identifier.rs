//! Case identifiers and storage triples
//!
//! A case is one job inside one execution of one workflow. Callers may name
//! the execution by run id or run number, and the job by job id or action
//! name; whichever halves are known, the triple is the stable storage key.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised while validating case identifiers or batch selectors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("workflow_name is required")]
    MissingWorkflowName,

    #[error("either run_id or run_number must be provided")]
    MissingExecutionIdentifier,

    #[error("either job_id or action_name must be provided")]
    MissingJobIdentifier,

    #[error("conflicting identifiers: {0}")]
    ConflictingIdentifiers(String),

    #[error("batch size must be greater than zero")]
    InvalidBatchSize,
}

/// How an execution is named in a triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ExecutionRef {
    /// Provider-assigned run id (canonical)
    Id(i64),
    /// Sequential run number within the workflow
    Number(i64),
}

impl ExecutionRef {
    /// Encoded form used as a storage key column
    pub fn to_key(&self) -> String {
        match self {
            ExecutionRef::Id(id) => format!("id:{}", id),
            ExecutionRef::Number(n) => format!("number:{}", n),
        }
    }

    /// Inverse of [`ExecutionRef::to_key`]
    pub fn from_key(key: &str) -> Option<Self> {
        let (kind, value) = key.split_once(':')?;
        let value: i64 = value.parse().ok()?;
        match kind {
            "id" => Some(ExecutionRef::Id(value)),
            "number" => Some(ExecutionRef::Number(value)),
            _ => None,
        }
    }
}

impl fmt::Display for ExecutionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionRef::Id(id) => write!(f, "{}", id),
            ExecutionRef::Number(n) => write!(f, "#{}", n),
        }
    }
}

/// How a job is named in a triple
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum JobRef {
    /// Provider-assigned job id (canonical)
    Id(String),
    /// Human-readable job name
    Action(String),
}

impl JobRef {
    pub fn to_key(&self) -> String {
        match self {
            JobRef::Id(id) => format!("id:{}", id),
            JobRef::Action(name) => format!("action:{}", name),
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        let (kind, value) = key.split_once(':')?;
        match kind {
            "id" => Some(JobRef::Id(value.to_string())),
            "action" => Some(JobRef::Action(value.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for JobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobRef::Id(id) => write!(f, "{}", id),
            JobRef::Action(name) => write!(f, "'{}'", name),
        }
    }
}

/// The `(workflow, execution, job)` key identifying one unit of CI work.
///
/// Ordering is lexicographic over the three parts, which gives batch
/// summaries a stable failure order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triple {
    pub workflow_name: String,
    pub execution: ExecutionRef,
    pub job: JobRef,
}

impl Triple {
    /// Triple keyed by run id and job id
    pub fn new(workflow_name: impl Into<String>, run_id: i64, job_id: impl Into<String>) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            execution: ExecutionRef::Id(run_id),
            job: JobRef::Id(job_id.into()),
        }
    }

    pub fn from_parts(workflow_name: impl Into<String>, execution: ExecutionRef, job: JobRef) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            execution,
            job,
        }
    }

    pub fn execution_key(&self) -> String {
        self.execution.to_key()
    }

    pub fn job_key(&self) -> String {
        self.job.to_key()
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.workflow_name, self.execution, self.job)
    }
}

/// Validated identifier for one case.
///
/// At least one half of each identifier pair is always present. The
/// other half may be filled in later by [`super::resolve_case`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "CaseFields")]
pub struct CaseIdentifier {
    workflow_name: String,
    run_id: Option<i64>,
    run_number: Option<i64>,
    job_id: Option<String>,
    action_name: Option<String>,
}

impl CaseIdentifier {
    /// Validate and construct a case identifier.
    ///
    /// Blank strings are treated as absent. Checks run in order: workflow
    /// name, execution identifier, job identifier.
    pub fn new(
        workflow_name: impl Into<String>,
        run_id: Option<i64>,
        run_number: Option<i64>,
        job_id: Option<String>,
        action_name: Option<String>,
    ) -> Result<Self, ValidationError> {
        let workflow_name = workflow_name.into();
        if workflow_name.trim().is_empty() {
            return Err(ValidationError::MissingWorkflowName);
        }
        if run_id.is_none() && run_number.is_none() {
            return Err(ValidationError::MissingExecutionIdentifier);
        }
        let job_id = non_blank(job_id);
        let action_name = non_blank(action_name);
        if job_id.is_none() && action_name.is_none() {
            return Err(ValidationError::MissingJobIdentifier);
        }

        Ok(Self {
            workflow_name,
            run_id,
            run_number,
            job_id,
            action_name,
        })
    }

    /// Shorthand for the common run-id + job-id case
    pub fn with_ids(
        workflow_name: impl Into<String>,
        run_id: i64,
        job_id: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        Self::new(workflow_name, Some(run_id), None, Some(job_id.into()), None)
    }

    pub fn builder(workflow_name: impl Into<String>) -> CaseIdentifierBuilder {
        CaseIdentifierBuilder {
            workflow_name: workflow_name.into(),
            ..Default::default()
        }
    }

    pub fn workflow_name(&self) -> &str {
        &self.workflow_name
    }

    pub fn run_id(&self) -> Option<i64> {
        self.run_id
    }

    pub fn run_number(&self) -> Option<i64> {
        self.run_number
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    pub fn action_name(&self) -> Option<&str> {
        self.action_name.as_deref()
    }

    /// Canonical execution reference: run id if known, else run number
    pub fn execution_ref(&self) -> ExecutionRef {
        match (self.run_id, self.run_number) {
            (Some(id), _) => ExecutionRef::Id(id),
            (None, Some(n)) => ExecutionRef::Number(n),
            // construction guarantees one half is present
            (None, None) => unreachable!("case identifier without execution identifier"),
        }
    }

    /// Canonical job reference: job id if known, else action name
    pub fn job_ref(&self) -> JobRef {
        match (&self.job_id, &self.action_name) {
            (Some(id), _) => JobRef::Id(id.clone()),
            (None, Some(name)) => JobRef::Action(name.clone()),
            (None, None) => unreachable!("case identifier without job identifier"),
        }
    }

    /// The storage key for this case. Pure; performs no lookups.
    pub fn triple(&self) -> Triple {
        Triple::from_parts(self.workflow_name.clone(), self.execution_ref(), self.job_ref())
    }

    /// Whether both halves of both pairs are known
    pub fn is_fully_resolved(&self) -> bool {
        self.run_id.is_some()
            && self.run_number.is_some()
            && self.job_id.is_some()
            && self.action_name.is_some()
    }

    pub(crate) fn fill_execution(&mut self, run_id: Option<i64>, run_number: Option<i64>) {
        if self.run_id.is_none() {
            self.run_id = run_id;
        }
        if self.run_number.is_none() {
            self.run_number = run_number;
        }
    }

    pub(crate) fn fill_job(&mut self, job_id: Option<String>, action_name: Option<String>) {
        if self.job_id.is_none() {
            self.job_id = non_blank(job_id);
        }
        if self.action_name.is_none() {
            self.action_name = non_blank(action_name);
        }
    }
}

/// Unvalidated wire form; deserialization goes through [`CaseIdentifier::new`]
#[derive(Deserialize)]
struct CaseFields {
    workflow_name: String,
    run_id: Option<i64>,
    run_number: Option<i64>,
    job_id: Option<String>,
    action_name: Option<String>,
}

impl TryFrom<CaseFields> for CaseIdentifier {
    type Error = ValidationError;

    fn try_from(fields: CaseFields) -> Result<Self, Self::Error> {
        CaseIdentifier::new(
            fields.workflow_name,
            fields.run_id,
            fields.run_number,
            fields.job_id,
            fields.action_name,
        )
    }
}

impl fmt::Display for CaseIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Case({}/{}/{})",
            self.workflow_name,
            self.execution_ref(),
            self.job_ref()
        )
    }
}

/// Incremental constructor for [`CaseIdentifier`]; validation happens in `build`
#[derive(Debug, Clone, Default)]
pub struct CaseIdentifierBuilder {
    workflow_name: String,
    run_id: Option<i64>,
    run_number: Option<i64>,
    job_id: Option<String>,
    action_name: Option<String>,
}

impl CaseIdentifierBuilder {
    pub fn run_id(mut self, run_id: i64) -> Self {
        self.run_id = Some(run_id);
        self
    }

    pub fn run_number(mut self, run_number: i64) -> Self {
        self.run_number = Some(run_number);
        self
    }

    pub fn job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub fn action_name(mut self, action_name: impl Into<String>) -> Self {
        self.action_name = Some(action_name.into());
        self
    }

    pub fn build(self) -> Result<CaseIdentifier, ValidationError> {
        CaseIdentifier::new(
            self.workflow_name,
            self.run_id,
            self.run_number,
            self.job_id,
            self.action_name,
        )
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triple_uses_ids() {
        let case = CaseIdentifier::with_ids("CI Tests", 12345, "abc").unwrap();
        assert_eq!(case.triple(), Triple::new("CI Tests", 12345, "abc"));
    }

    #[test]
    fn test_missing_workflow_name() {
        let err = CaseIdentifier::new("  ", Some(1), None, Some("j".into()), None).unwrap_err();
        assert_eq!(err, ValidationError::MissingWorkflowName);
    }

    #[test]
    fn test_missing_execution_identifier() {
        let err = CaseIdentifier::new("CI", None, None, Some("j".into()), None).unwrap_err();
        assert_eq!(err, ValidationError::MissingExecutionIdentifier);
    }

    #[test]
    fn test_missing_job_identifier() {
        let err = CaseIdentifier::new("CI", Some(1), None, None, Some(" ".into())).unwrap_err();
        assert_eq!(err, ValidationError::MissingJobIdentifier);
    }

    #[test]
    fn test_workflow_checked_before_other_fields() {
        let err = CaseIdentifier::new("", None, None, None, None).unwrap_err();
        assert_eq!(err, ValidationError::MissingWorkflowName);
    }

    #[test]
    fn test_triple_falls_back_to_human_readable_halves() {
        let case = CaseIdentifier::builder("CI")
            .run_number(42)
            .action_name("test (ubuntu-latest, 3.10)")
            .build()
            .unwrap();

        let triple = case.triple();
        assert_eq!(triple.execution, ExecutionRef::Number(42));
        assert_eq!(triple.job, JobRef::Action("test (ubuntu-latest, 3.10)".into()));
    }

    #[test]
    fn test_numeric_id_preferred_when_both_known() {
        let case = CaseIdentifier::builder("CI")
            .run_id(100)
            .run_number(7)
            .job_id("55")
            .action_name("lint")
            .build()
            .unwrap();

        assert_eq!(case.triple(), Triple::new("CI", 100, "55"));
        assert!(case.is_fully_resolved());
    }

    #[test]
    fn test_keys_round_trip() {
        let refs = [ExecutionRef::Id(9), ExecutionRef::Number(3)];
        for r in refs {
            assert_eq!(ExecutionRef::from_key(&r.to_key()), Some(r));
        }
        let job = JobRef::Action("build: linux".into());
        assert_eq!(JobRef::from_key(&job.to_key()), Some(job));
        assert_eq!(ExecutionRef::from_key("bogus"), None);
    }

    #[test]
    fn test_display() {
        let case = CaseIdentifier::builder("CI")
            .run_number(3)
            .action_name("lint")
            .build()
            .unwrap();
        assert_eq!(case.to_string(), "Case(CI/#3/'lint')");
    }

    #[test]
    fn test_deserialize_validates() {
        let json = r#"{"workflow_name":"CI","run_id":null,"run_number":null,"job_id":"1","action_name":null}"#;
        assert!(serde_json::from_str::<CaseIdentifier>(json).is_err());

        let case = CaseIdentifier::with_ids("CI", 5, "j").unwrap();
        let back: CaseIdentifier = serde_json::from_str(&serde_json::to_string(&case).unwrap()).unwrap();
        assert_eq!(back, case);
    }

    #[test]
    fn test_fill_keeps_supplied_values() {
        let mut case = CaseIdentifier::with_ids("CI", 1, "j").unwrap();
        case.fill_execution(Some(99), Some(4));
        case.fill_job(Some("other".into()), Some("test".into()));
        assert_eq!(case.run_id(), Some(1));
        assert_eq!(case.run_number(), Some(4));
        assert_eq!(case.job_id(), Some("j"));
        assert_eq!(case.action_name(), Some("test"));
    }
}
