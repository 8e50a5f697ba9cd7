//! Lazy resolution of the "other half" of each identifier pair
//!
//! Resolution is a lookup capability, not stored logic: the orchestrator
//! calls [`resolve_case`] before a triple is used for storage.

use super::identifier::{CaseIdentifier, ExecutionRef, JobRef, ValidationError};
use crate::provider::FetchError;
use async_trait::async_trait;
use thiserror::Error;

/// Both halves of an execution identifier as known to the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionPair {
    pub run_id: i64,
    pub run_number: Option<i64>,
}

/// Both halves of a job identifier as known to the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPair {
    pub job_id: String,
    pub action_name: Option<String>,
}

/// Lookup capability mapping numeric ids to human-readable names and back.
///
/// `Ok(None)` means the provider does not know the identifier; the
/// unresolved half then stays absent.
#[async_trait]
pub trait IdentifierResolver: Send + Sync {
    async fn lookup_execution(
        &self,
        workflow_name: &str,
        execution: ExecutionRef,
    ) -> Result<Option<ExecutionPair>, FetchError>;

    async fn lookup_job(
        &self,
        workflow_name: &str,
        run_id: Option<i64>,
        job: &JobRef,
    ) -> Result<Option<JobPair>, FetchError>;
}

/// Errors from [`resolve_case`]
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("identifier lookup failed: {0}")]
    Lookup(#[from] FetchError),
}

/// Fill in missing identifier halves and detect conflicting pairs.
///
/// When both halves of a pair were supplied and the resolver maps one of
/// them to a different partner, the result is
/// [`ValidationError::ConflictingIdentifiers`].
pub async fn resolve_case(
    case: &CaseIdentifier,
    resolver: &dyn IdentifierResolver,
) -> Result<CaseIdentifier, ResolveError> {
    let mut resolved = case.clone();
    let workflow = case.workflow_name();

    match (case.run_id(), case.run_number()) {
        (Some(run_id), supplied_number) => {
            let by_id = resolver
                .lookup_execution(workflow, ExecutionRef::Id(run_id))
                .await?;
            match (by_id, supplied_number) {
                (Some(pair), Some(number)) => {
                    if let Some(found) = pair.run_number {
                        if found != number {
                            return Err(execution_conflict(run_id, number, found).into());
                        }
                    }
                }
                (Some(pair), None) => resolved.fill_execution(None, pair.run_number),
                (None, Some(number)) => {
                    // run id unknown: cross-check from the other side
                    if let Some(pair) = resolver
                        .lookup_execution(workflow, ExecutionRef::Number(number))
                        .await?
                    {
                        if pair.run_id != run_id {
                            return Err(ValidationError::ConflictingIdentifiers(format!(
                                "run number {} belongs to run {}, not run {}",
                                number, pair.run_id, run_id
                            ))
                            .into());
                        }
                    }
                }
                (None, None) => {}
            }
        }
        (None, Some(number)) => {
            if let Some(pair) = resolver
                .lookup_execution(workflow, ExecutionRef::Number(number))
                .await?
            {
                resolved.fill_execution(Some(pair.run_id), None);
            }
        }
        (None, None) => {}
    }

    let run_id = resolved.run_id();
    match (case.job_id(), case.action_name()) {
        (Some(job_id), supplied_name) => {
            let by_id = resolver
                .lookup_job(workflow, run_id, &JobRef::Id(job_id.to_string()))
                .await?;
            match (by_id, supplied_name) {
                (Some(pair), Some(name)) => {
                    if let Some(found) = pair.action_name.as_deref() {
                        if found != name {
                            return Err(ValidationError::ConflictingIdentifiers(format!(
                                "job {} is named '{}', not '{}'",
                                job_id, found, name
                            ))
                            .into());
                        }
                    }
                }
                (Some(pair), None) => resolved.fill_job(None, pair.action_name),
                (None, Some(name)) => {
                    if let Some(pair) = resolver
                        .lookup_job(workflow, run_id, &JobRef::Action(name.to_string()))
                        .await?
                    {
                        if pair.job_id != job_id {
                            return Err(ValidationError::ConflictingIdentifiers(format!(
                                "action '{}' belongs to job {}, not job {}",
                                name, pair.job_id, job_id
                            ))
                            .into());
                        }
                    }
                }
                (None, None) => {}
            }
        }
        (None, Some(name)) => {
            if let Some(pair) = resolver
                .lookup_job(workflow, run_id, &JobRef::Action(name.to_string()))
                .await?
            {
                resolved.fill_job(Some(pair.job_id), None);
            }
        }
        (None, None) => {}
    }

    Ok(resolved)
}

fn execution_conflict(run_id: i64, supplied: i64, found: i64) -> ValidationError {
    ValidationError::ConflictingIdentifiers(format!(
        "run {} has run number {}, not {}",
        run_id, found, supplied
    ))
}
