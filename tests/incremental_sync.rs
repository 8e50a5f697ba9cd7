//! Incremental sync: stored records stand in for stages unless forced

mod common;

use common::{case, minutes_after_epoch, Harness};
use scout::{AnalysisStore, BatchSelector, ExecutionStore, IncrementalSync, MockProvider, StageSkipSet};

fn three_runs() -> MockProvider {
    (1..=3).fold(MockProvider::new(), |provider, n| {
        provider.with_log(case(n, "abc"), minutes_after_epoch(n), format!("[PASS] a{}\n[FAIL] b{}", n, n))
    })
}

#[tokio::test]
async fn second_sync_fetches_and_parses_nothing() {
    let harness = Harness::new(three_runs()).with_incremental(IncrementalSync::new());
    let all = BatchSelector::all(None);

    let first = harness.orchestrator.run_batch(&all, StageSkipSet::none()).await;
    assert_eq!(first.fetched, 3);
    assert_eq!(first.parsed, 3);
    assert_eq!(first.reused_raw, 0);
    assert_eq!(first.already_parsed, 0);

    let second = harness.orchestrator.run_batch(&all, StageSkipSet::none()).await;
    assert!(second.is_success());
    assert_eq!(second.completed, 3);
    assert_eq!(second.fetched, 0);
    assert_eq!(second.parsed, 0);
    assert_eq!(second.reused_raw, 3);
    assert_eq!(second.already_parsed, 3);
    assert_eq!(harness.provider.fetch_count(), 3);
}

#[tokio::test]
async fn unparsed_record_is_parsed_from_the_store() {
    let harness = Harness::new(three_runs()).with_incremental(IncrementalSync::new());
    let triple = case(2, "abc").triple();

    let download_only = harness
        .orchestrator
        .run_single(&case(2, "abc"), StageSkipSet::none().with_skip_parse())
        .await;
    assert!(download_only.is_done());
    assert!(!harness.store.load_execution(&triple).unwrap().unwrap().parsed);

    let result = harness.orchestrator.run_single(&case(2, "abc"), StageSkipSet::none()).await;
    assert!(result.is_done());
    assert!(result.reused_raw);
    assert!(!result.already_parsed);
    assert!(!result.fetched);
    assert!(result.parsed);

    assert_eq!(harness.provider.fetch_count(), 1);
    assert!(harness.store.load_execution(&triple).unwrap().unwrap().parsed);
    assert!(harness.store.load_analysis(&triple).unwrap().is_some());
}

#[tokio::test]
async fn force_parse_reparses_without_fetching() {
    let harness = Harness::new(three_runs())
        .with_incremental(IncrementalSync::new().with_force_parse());
    let all = BatchSelector::all(None);

    harness.orchestrator.run_batch(&all, StageSkipSet::none()).await;
    let summary = harness.orchestrator.run_batch(&all, StageSkipSet::none()).await;

    assert_eq!(summary.fetched, 0);
    assert_eq!(summary.reused_raw, 3);
    assert_eq!(summary.parsed, 3);
    assert_eq!(summary.already_parsed, 0);
    assert_eq!(harness.provider.fetch_count(), 3);
    assert_eq!(harness.orchestrator.query_analyses(&case(1, "abc").triple()).unwrap().len(), 1);
}

#[tokio::test]
async fn force_download_refetches_and_keeps_parsed_flag() {
    let harness = Harness::new(three_runs())
        .with_incremental(IncrementalSync::new().with_force_download());
    let triple = case(3, "abc").triple();

    harness.orchestrator.run_single(&case(3, "abc"), StageSkipSet::none()).await;
    let result = harness.orchestrator.run_single(&case(3, "abc"), StageSkipSet::none()).await;

    assert!(result.is_done());
    assert!(result.fetched);
    assert!(!result.reused_raw);
    assert!(result.already_parsed);
    assert!(!result.parsed);
    assert_eq!(harness.provider.fetch_count(), 2);
    assert!(harness.store.load_execution(&triple).unwrap().unwrap().parsed);
}
