//! End-to-end ingestion from a local log directory into a SQLite file
//!
//! Wires the pipeline the way the CLI does: configuration from YAML, the
//! local provider as both provider and resolver, one database for both
//! stores.

mod common;

use common::{minutes_after_epoch, LogDir};
use scout::case::resolve_case;
use scout::{
    AnalysisStore, BatchSelector, CaseIdentifier, ExecutionStore, LocalLogProvider, OpenStore, PipelineOrchestrator,
    ScoutConfig, SqliteStore, StageSkipSet, Triple,
};
use std::sync::Arc;
use tempfile::TempDir;

const PYTEST_LOG: &str = "\
tests/test_api.py::test_ok PASSED                                   [ 50%]
tests/test_api.py::test_broken FAILED                               [100%]

=================================== FAILURES ===================================
_________________________________ test_broken __________________________________
E       assert 1 == 2
=========================== short test summary info ============================
FAILED tests/test_api.py::test_broken - assert 1 == 2
";

const FLAKE8_LOG: &str = "\
src/app.py:10:1: E302 expected 2 blank lines, found 1
src/app.py:42:80: E501 line too long (91 > 79 characters)
";

fn config_for(logs: &LogDir, db_dir: &TempDir) -> ScoutConfig {
    let yaml = format!(
        "database: {}\nlogs_dir: {}\nconcurrency: 2\nparsers:\n  default: [markers]\n  job_patterns:\n    - pattern: test\n      parser: pytest\n    - pattern: lint\n      parser: flake8\n",
        db_dir.path().join("scout.db").display(),
        logs.path().display()
    );
    ScoutConfig::from_yaml(&yaml).unwrap()
}

fn orchestrator(config: &ScoutConfig, store: Arc<SqliteStore>) -> PipelineOrchestrator {
    let provider = Arc::new(LocalLogProvider::new(&config.logs_dir));
    PipelineOrchestrator::new(provider.clone(), config.parser_adapter(), store.clone(), store)
        .with_resolver(provider)
        .with_concurrency(config.concurrency)
}

fn sample_logs() -> LogDir {
    let logs = LogDir::new();
    logs.add_run(
        "CI Tests",
        5001,
        17,
        minutes_after_epoch(10),
        &[("901", "test", PYTEST_LOG), ("902", "lint", FLAKE8_LOG)],
    );
    logs.add_run(
        "CI Tests",
        5002,
        18,
        minutes_after_epoch(20),
        &[("903", "smoke", "[PASS] boot\n[FAIL] login")],
    );
    logs
}

#[tokio::test]
async fn sync_routes_each_job_to_its_parser() {
    let logs = sample_logs();
    let db_dir = TempDir::new().unwrap();
    let config = config_for(&logs, &db_dir);
    let store = Arc::new(SqliteStore::open(&config.database).unwrap());

    let summary = orchestrator(&config, store.clone())
        .run_batch(&BatchSelector::all(None), StageSkipSet::none())
        .await;
    assert!(summary.is_success(), "failures: {:?}", summary.failures);
    assert_eq!(summary.total, 3);
    assert_eq!(summary.parsed, 3);

    let pytest = store
        .load_analysis_kind(&Triple::new("CI Tests", 5001, "901"), "pytest")
        .unwrap()
        .unwrap();
    assert_eq!(pytest.parsed_data["passed"], 1);
    assert_eq!(pytest.parsed_data["failed"], 1);
    assert_eq!(pytest.parsed_data["failed_tests"][0]["test_nodeid"], "tests/test_api.py::test_broken");

    let flake8 = store
        .load_analysis_kind(&Triple::new("CI Tests", 5001, "902"), "flake8")
        .unwrap()
        .unwrap();
    assert_eq!(flake8.parsed_data["violation_count"], 2);

    let markers = store.load_analysis(&Triple::new("CI Tests", 5002, "903")).unwrap().unwrap();
    assert_eq!(markers.analysis_kind, "markers");
    assert_eq!(markers.parsed_data["failures"][0], "login");

    let execution = store.load_execution(&Triple::new("CI Tests", 5001, "901")).unwrap().unwrap();
    assert_eq!(execution.content_type, "github_actions");
    assert_eq!(execution.metadata.get("branch").map(String::as_str), Some("main"));
    assert_eq!(execution.metadata.get("commit_sha").map(String::as_str), Some("sha-5001"));
    assert!(execution.parsed);
}

#[tokio::test]
async fn stored_data_survives_reopen_and_name_lookup() {
    let logs = sample_logs();
    let db_dir = TempDir::new().unwrap();
    let config = config_for(&logs, &db_dir);

    {
        let store = Arc::new(SqliteStore::open(&config.database).unwrap());
        let summary = orchestrator(&config, store)
            .run_batch(&BatchSelector::last_n(1, None).unwrap(), StageSkipSet::none())
            .await;
        assert_eq!(summary.total, 1);
    }

    let store = SqliteStore::open(&config.database).unwrap();
    let by_name = CaseIdentifier::builder("CI Tests")
        .run_number(18)
        .action_name("smoke")
        .build()
        .unwrap();
    let provider = LocalLogProvider::new(&config.logs_dir);
    let resolved = resolve_case(&by_name, &provider).await.unwrap();
    assert_eq!(resolved.triple(), Triple::new("CI Tests", 5002, "903"));

    let record = store.load_execution(&resolved.triple()).unwrap().unwrap();
    assert_eq!(record.raw_content, "[PASS] boot\n[FAIL] login");
    assert_eq!(store.list_analyses(&resolved.triple()).unwrap().len(), 1);

    // only the newest run was selected
    assert!(store.load_execution(&Triple::new("CI Tests", 5001, "901")).unwrap().is_none());
}

#[tokio::test]
async fn missing_log_file_fails_that_case_only() {
    let logs = sample_logs();
    std::fs::remove_file(logs.path().join("CI Tests").join("5001").join("902.log")).unwrap();
    let db_dir = TempDir::new().unwrap();
    let config = config_for(&logs, &db_dir);
    let store = Arc::new(SqliteStore::open(&config.database).unwrap());

    let summary = orchestrator(&config, store)
        .run_batch(&BatchSelector::all(Some("CI Tests".into())), StageSkipSet::none())
        .await;

    assert_eq!(summary.total, 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.failures[0].triple, Triple::new("CI Tests", 5001, "902"));
}
