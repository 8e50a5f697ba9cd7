//! Batch runs: selection, ordering, partial failure and cancellation

mod common;

use common::{case, minutes_after_epoch, Harness};
use scout::{
    BatchSelector, CaseIdentifier, ExecutionStore, FetchError, MockProvider, Stage, StageSkipSet, Triple,
};
use std::time::Duration;

fn five_runs() -> MockProvider {
    // registered out of order; listing order comes from created_at
    [3, 1, 5, 2, 4].into_iter().fold(MockProvider::new(), |provider, n| {
        provider.with_log(case(n, "abc"), minutes_after_epoch(n), format!("[PASS] run{}", n))
    })
}

fn stored_run_ids(harness: &Harness) -> Vec<i64> {
    harness
        .store
        .list_recent_executions(None, 100)
        .unwrap()
        .into_iter()
        .filter_map(|record| record.case.run_id())
        .collect()
}

/// Run ids in the order they were stored; with one worker, the order processed
fn processing_order(harness: &Harness) -> Vec<i64> {
    let mut ids = stored_run_ids(harness);
    ids.reverse();
    ids
}

#[tokio::test]
async fn partial_failure_does_not_abort_the_batch() {
    let provider = MockProvider::new()
        .with_log(case(1, "abc"), minutes_after_epoch(1), "[PASS] a")
        .with_failure(
            case(2, "abc"),
            minutes_after_epoch(2),
            FetchError::Unavailable("HTTP 502".into()),
        )
        .with_log(case(3, "abc"), minutes_after_epoch(3), "[FAIL] b");
    let harness = Harness::new(provider).with_concurrency(2);

    let summary = harness
        .orchestrator
        .run_batch(&BatchSelector::all(None), StageSkipSet::none())
        .await;

    assert_eq!(summary.total, 3);
    assert_eq!(summary.fetched, 2);
    assert_eq!(summary.parsed, 2);
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.failed, 1);
    assert!(!summary.is_success());
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].triple, case(2, "abc").triple());
    assert_eq!(summary.failures[0].stage, Stage::Fetch);
    assert!(summary.failures[0].reason.contains("HTTP 502"));

    assert_eq!(stored_run_ids(&harness).len(), 2);
}

#[tokio::test]
async fn failures_are_sorted_by_triple() {
    let provider = [30, 10, 20].into_iter().fold(MockProvider::new(), |provider, n| {
        provider.with_failure(
            case(n, "abc"),
            minutes_after_epoch(100 - n),
            FetchError::NotFound(format!("run {}", n)),
        )
    });
    let harness = Harness::new(provider).with_concurrency(3);

    let summary = harness
        .orchestrator
        .run_batch(&BatchSelector::all(None), StageSkipSet::none())
        .await;

    let triples: Vec<Triple> = summary.failures.iter().map(|f| f.triple.clone()).collect();
    assert_eq!(
        triples,
        vec![case(10, "abc").triple(), case(20, "abc").triple(), case(30, "abc").triple()]
    );
}

#[tokio::test]
async fn last_n_processes_newest_cases_oldest_first() {
    let harness = Harness::new(five_runs());

    let summary = harness
        .orchestrator
        .run_batch(&BatchSelector::last_n(2, None).unwrap(), StageSkipSet::none())
        .await;
    assert_eq!(summary.total, 2);
    assert!(summary.is_success());

    // most recently stored first: run 4 was processed before run 5
    assert_eq!(stored_run_ids(&harness), vec![5, 4]);
}

#[tokio::test]
async fn larger_last_n_covers_smaller_selection_in_same_order() {
    let small = Harness::new(five_runs());
    small
        .orchestrator
        .run_batch(&BatchSelector::last_n(2, None).unwrap(), StageSkipSet::none())
        .await;
    let large = Harness::new(five_runs());
    large
        .orchestrator
        .run_batch(&BatchSelector::last_n(3, None).unwrap(), StageSkipSet::none())
        .await;

    let small_order = processing_order(&small);
    let large_order = processing_order(&large);
    assert_eq!(small_order, vec![4, 5]);
    assert_eq!(large_order, vec![3, 4, 5]);

    let overlap: Vec<i64> = large_order.into_iter().filter(|id| small_order.contains(id)).collect();
    assert_eq!(overlap, small_order);
}

#[tokio::test]
async fn workflow_filter_limits_listing() {
    let nightly = CaseIdentifier::with_ids("Nightly", 99, "abc").unwrap();
    let provider = MockProvider::new()
        .with_log(case(1, "abc"), minutes_after_epoch(1), "[PASS] a")
        .with_log(nightly.clone(), minutes_after_epoch(2), "[PASS] b");
    let harness = Harness::new(provider);

    let summary = harness
        .orchestrator
        .run_batch(&BatchSelector::all(Some("Nightly".into())), StageSkipSet::none())
        .await;

    assert_eq!(summary.total, 1);
    assert!(harness.store.load_execution(&nightly.triple()).unwrap().is_some());
    assert!(harness.store.load_execution(&case(1, "abc").triple()).unwrap().is_none());
}

#[tokio::test]
async fn listing_failure_is_reported_as_batch_failure() {
    let harness = Harness::new(MockProvider::new().with_listing_failure(FetchError::Unavailable("rate limited".into())));

    let summary = harness
        .orchestrator
        .run_batch(&BatchSelector::all(None), StageSkipSet::none())
        .await;

    assert_eq!(summary.batch_failure.as_deref(), Some("provider unavailable: rate limited"));
    assert_eq!(summary.total, 0);
    assert!(summary.failures.is_empty());
    assert!(!summary.is_success());
}

#[tokio::test]
async fn single_selector_does_not_list() {
    let harness = Harness::new(five_runs());

    let summary = harness
        .orchestrator
        .run_batch(&BatchSelector::single(case(2, "abc")), StageSkipSet::none())
        .await;

    assert_eq!(summary.total, 1);
    assert_eq!(harness.provider.list_count(), 0);
    assert_eq!(stored_run_ids(&harness), vec![2]);
}

#[tokio::test]
async fn reparse_batch_never_fetches() {
    let harness = Harness::new(five_runs());
    harness
        .orchestrator
        .run_batch(&BatchSelector::all(None), StageSkipSet::none().with_skip_parse())
        .await;
    assert_eq!(harness.provider.fetch_count(), 5);

    let summary = harness
        .orchestrator
        .run_batch(&BatchSelector::all(None), StageSkipSet::reparse())
        .await;

    assert_eq!(summary.parsed, 5);
    assert_eq!(summary.fetched, 0);
    assert_eq!(harness.provider.fetch_count(), 5);
    assert!(harness.store.list_recent_executions(None, 10).unwrap().iter().all(|r| r.parsed));
}

#[tokio::test]
async fn cancelled_before_start_runs_nothing() {
    let harness = Harness::new(five_runs());
    harness.orchestrator.cancellation_token().cancel();

    let summary = harness
        .orchestrator
        .run_batch(&BatchSelector::all(None), StageSkipSet::none())
        .await;

    assert_eq!(summary.total, 5);
    assert_eq!(summary.cancelled, 5);
    assert_eq!(harness.provider.fetch_count(), 0);
    assert!(stored_run_ids(&harness).is_empty());
}

#[tokio::test]
async fn cancel_mid_batch_finishes_current_stage_only() {
    let harness = Harness::new(
        MockProvider::new()
            .with_log(case(1, "abc"), minutes_after_epoch(1), "[PASS] a")
            .with_log(case(2, "abc"), minutes_after_epoch(2), "[PASS] b")
            .with_log(case(3, "abc"), minutes_after_epoch(3), "[PASS] c")
            .with_fetch_delay(Duration::from_millis(200)),
    );
    let token = harness.orchestrator.cancellation_token();

    let selector = BatchSelector::all(None);
    let (summary, _) = tokio::join!(
        harness
            .orchestrator
            .run_batch(&selector, StageSkipSet::none()),
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        }
    );

    // the first fetch completes; nothing starts afterwards
    assert_eq!(summary.total, 3);
    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.cancelled, 3);
    assert_eq!(summary.completed, 0);
    assert_eq!(harness.provider.fetch_count(), 1);
    assert!(stored_run_ids(&harness).is_empty());
}
