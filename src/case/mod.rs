//! Case identification model
//!
//! - **CaseIdentifier**: validated `(workflow, execution, job)` naming, where
//!   each of execution and job may be given by numeric id or human-readable name
//! - **Triple**: the canonical storage key derived from a case
//! - **IdentifierResolver**: lookup capability that fills in the other half
//!   of each identifier pair and detects conflicts
//! - **BatchSelector** / **StageSkipSet**: what a pipeline run covers and
//!   which stages it executes
//! - **IncrementalSync**: which stages stored records already satisfy

mod identifier;
mod resolver;
mod selector;

pub use identifier::{CaseIdentifier, CaseIdentifierBuilder, ExecutionRef, JobRef, Triple, ValidationError};
pub use resolver::{resolve_case, ExecutionPair, IdentifierResolver, JobPair, ResolveError};
pub use selector::{BatchSelector, IncrementalPlan, IncrementalSync, StageSkipSet};
