//! Failure insights over stored analyses
//!
//! Reads the most recent analysis records and reports two patterns:
//! tests that both pass and fail across runs (flaky), and tests that fail in
//! at least `min_occurrences` distinct cases (recurring).
//!
//! Only analysis kinds that name individual tests contribute. `pytest`
//! records carry passes and failures; `markers` records carry failures only,
//! so they count toward recurring failures but can never make a test flaky.

use crate::case::Triple;
use crate::storage::{AnalysisRecord, AnalysisStore, StorageError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InsightError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("invalid option: {0}")]
    InvalidOption(String),
}

/// Thresholds for both detectors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightOptions {
    /// Cases a test must appear in before it can be called flaky
    pub min_runs: usize,
    /// Flaky when `threshold <= fail_rate <= 1 - threshold`
    pub flakiness_threshold: f64,
    /// Failing cases before a failure counts as recurring
    pub min_occurrences: usize,
    /// Most recent analysis records read
    pub window: usize,
}

impl Default for InsightOptions {
    fn default() -> Self {
        Self {
            min_runs: 5,
            flakiness_threshold: 0.3,
            min_occurrences: 3,
            window: 500,
        }
    }
}

impl InsightOptions {
    pub fn validate(&self) -> Result<(), InsightError> {
        if self.min_runs == 0 {
            return Err(InsightError::InvalidOption("min_runs must be at least 1".into()));
        }
        if self.min_occurrences == 0 {
            return Err(InsightError::InvalidOption("min_occurrences must be at least 1".into()));
        }
        if self.window == 0 {
            return Err(InsightError::InvalidOption("window must be at least 1".into()));
        }
        if !(0.0..=0.5).contains(&self.flakiness_threshold) {
            return Err(InsightError::InvalidOption(format!(
                "flakiness_threshold must be within 0.0..=0.5, got {}",
                self.flakiness_threshold
            )));
        }
        Ok(())
    }
}

/// One test's result in one case
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestOutcome {
    pub triple: Triple,
    pub test_name: String,
    pub passed: bool,
}

impl TestOutcome {
    fn new(record: &AnalysisRecord, test_name: &str, passed: bool) -> Self {
        Self {
            triple: record.case.triple(),
            test_name: test_name.to_string(),
            passed,
        }
    }
}

/// String entries of `data[key]`, or of `data[key][*][field]`
fn names<'a>(data: &'a Value, key: &str, field: Option<&'a str>) -> impl Iterator<Item = &'a str> {
    data.get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(move |entry| match field {
            Some(field) => entry.get(field).and_then(Value::as_str),
            None => entry.as_str(),
        })
}

/// Per-test outcomes named by one analysis record
pub fn outcomes(record: &AnalysisRecord) -> Vec<TestOutcome> {
    let data = &record.parsed_data;
    match record.analysis_kind.as_str() {
        "pytest" => names(data, "passed_tests", None)
            .map(|name| TestOutcome::new(record, name, true))
            .chain(names(data, "failed_tests", Some("test_nodeid")).map(|name| TestOutcome::new(record, name, false)))
            .collect(),
        "markers" => names(data, "failures", None)
            .map(|name| TestOutcome::new(record, name, false))
            .collect(),
        _ => Vec::new(),
    }
}

/// test name -> case -> passed; a failure in any record for the case wins
fn by_case(outcomes: &[TestOutcome]) -> BTreeMap<&str, HashMap<&Triple, bool>> {
    let mut grouped: BTreeMap<&str, HashMap<&Triple, bool>> = BTreeMap::new();
    for outcome in outcomes {
        grouped
            .entry(outcome.test_name.as_str())
            .or_default()
            .entry(&outcome.triple)
            .and_modify(|passed| *passed &= outcome.passed)
            .or_insert(outcome.passed);
    }
    grouped
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlakyTest {
    pub test_name: String,
    pub pass_rate: f64,
    pub fail_rate: f64,
    /// Distinct cases the test appeared in
    pub total_runs: usize,
}

/// Tests seen in at least `min_runs` cases whose failure rate lies within
/// `[threshold, 1 - threshold]`. Highest failure rate first, then by name.
pub fn detect_flaky_tests(outcomes: &[TestOutcome], min_runs: usize, threshold: f64) -> Vec<FlakyTest> {
    let mut flaky: Vec<FlakyTest> = by_case(outcomes)
        .into_iter()
        .filter(|(_, cases)| cases.len() >= min_runs)
        .filter_map(|(name, cases)| {
            let total = cases.len();
            let failed = cases.values().filter(|passed| !**passed).count();
            let fail_rate = failed as f64 / total as f64;
            (threshold..=1.0 - threshold).contains(&fail_rate).then(|| FlakyTest {
                test_name: name.to_string(),
                pass_rate: (total - failed) as f64 / total as f64,
                fail_rate,
                total_runs: total,
            })
        })
        .collect();

    flaky.sort_by(|a, b| b.fail_rate.total_cmp(&a.fail_rate).then_with(|| a.test_name.cmp(&b.test_name)));
    flaky
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecurringFailure {
    pub test_name: String,
    /// Distinct cases the test failed in
    pub occurrences: usize,
    /// Greatest failing case by triple order
    pub latest: Triple,
}

/// Tests failing in at least `min_occurrences` distinct cases. Most
/// occurrences first, then by name.
pub fn detect_recurring_failures(outcomes: &[TestOutcome], min_occurrences: usize) -> Vec<RecurringFailure> {
    let mut failing: BTreeMap<&str, HashSet<&Triple>> = BTreeMap::new();
    for outcome in outcomes.iter().filter(|o| !o.passed) {
        failing.entry(outcome.test_name.as_str()).or_default().insert(&outcome.triple);
    }

    let mut recurring: Vec<RecurringFailure> = failing
        .into_iter()
        .filter(|(_, cases)| cases.len() >= min_occurrences)
        .filter_map(|(name, cases)| {
            let latest = cases.iter().max()?;
            Some(RecurringFailure {
                test_name: name.to_string(),
                occurrences: cases.len(),
                latest: (*latest).clone(),
            })
        })
        .collect();

    recurring.sort_by(|a, b| b.occurrences.cmp(&a.occurrences).then_with(|| a.test_name.cmp(&b.test_name)));
    recurring
}

/// Both reports over one window of stored analyses
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insights {
    pub analyses_scanned: usize,
    pub flaky_tests: Vec<FlakyTest>,
    pub recurring_failures: Vec<RecurringFailure>,
}

/// Read the newest `options.window` analyses (optionally for one workflow)
/// and run both detectors over them.
pub fn collect_insights(
    store: &dyn AnalysisStore,
    workflow: Option<&str>,
    options: &InsightOptions,
) -> Result<Insights, InsightError> {
    options.validate()?;
    let records = store.list_recent_analyses(workflow, options.window)?;
    let observed: Vec<TestOutcome> = records.iter().flat_map(outcomes).collect();
    tracing::debug!(
        analyses = records.len(),
        outcomes = observed.len(),
        workflow = ?workflow,
        "collecting insights"
    );

    Ok(Insights {
        analyses_scanned: records.len(),
        flaky_tests: detect_flaky_tests(&observed, options.min_runs, options.flakiness_threshold),
        recurring_failures: detect_recurring_failures(&observed, options.min_occurrences),
    })
}
