mod common;

use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use common::{pipeline, run, FakeSource};
use trainwatch::{Outcome, ScanCoordinator};

fn stops(n: usize) -> serde_json::Value {
    serde_json::Value::Array(vec![json!({}); n])
}

#[tokio::test]
async fn scans_range_end_to_end() {
    let source = Arc::new(FakeSource::new().with_train(
        1,
        vec![run("05-12-2024", json!({ "subTitle": "Guasto", "fermate": stops(3) }))],
    ));
    let pipeline = Arc::new(pipeline(source).await);
    let coordinator = ScanCoordinator::new(pipeline.clone(), 1);

    let mut lines = Vec::new();
    let summary = coordinator
        .run(1..3, CancellationToken::new(), |outcome| lines.push(outcome.to_string()))
        .await;

    lines.sort();
    assert_eq!(
        lines,
        vec![
            "2 → no data".to_string(),
            "Saved 1 -> Guasto with 3 stations".to_string(),
        ]
    );
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.saved, 1);
    assert_eq!(summary.newly_stored, 1);
    assert_eq!(summary.no_data, 1);
    assert_eq!(pipeline.store().count().await.unwrap(), 1);
}

#[tokio::test]
async fn never_exceeds_pool_size() {
    let mut source = FakeSource::new().with_delay(Duration::from_millis(5));
    for train in 0..40 {
        source = source.with_train(
            train,
            vec![
                run("01-02-2024", json!({ "subTitle": "", "fermate": stops(1) })),
                run("02-02-2024", json!({ "subTitle": "", "fermate": stops(1) })),
            ],
        );
    }
    let source = Arc::new(source);
    let coordinator = ScanCoordinator::new(Arc::new(pipeline(source.clone()).await), 4);

    let summary = coordinator
        .run(0..40, CancellationToken::new(), |_| {})
        .await;

    assert_eq!(summary.processed, 40);
    assert_eq!(summary.no_issue, 40);
    assert_eq!(
        source.max_in_flight(),
        4,
        "pool of 4 should keep exactly 4 call chains in flight"
    );
}

#[tokio::test]
async fn every_train_yields_exactly_one_outcome() {
    let source = Arc::new(FakeSource::new().with_delay(Duration::from_millis(1)));
    let coordinator = ScanCoordinator::new(Arc::new(pipeline(source).await), 8);

    let mut handle = coordinator.start(100..160, CancellationToken::new());
    let mut seen = HashSet::new();
    while let Some(outcome) = handle.next().await {
        assert!(matches!(outcome, Outcome::NoData { .. }));
        assert!(seen.insert(outcome.train_number()), "duplicate outcome");
    }
    handle.join().await;

    assert_eq!(seen, (100..160).collect::<HashSet<u32>>());
}

#[tokio::test]
async fn work_continues_after_consumer_stops_reading() {
    let mut source = FakeSource::new().with_delay(Duration::from_millis(2));
    for train in 0..10 {
        source = source.with_train(
            train,
            vec![run("05-12-2024", json!({ "subTitle": "Ritardo", "fermate": stops(2) }))],
        );
    }
    let pipeline = Arc::new(pipeline(Arc::new(source)).await);
    let coordinator = ScanCoordinator::new(pipeline.clone(), 2);

    let mut handle = coordinator.start(0..10, CancellationToken::new());
    assert!(handle.next().await.is_some());
    handle.join().await;

    assert_eq!(pipeline.store().count().await.unwrap(), 10);
}

#[tokio::test]
async fn cancelled_scan_takes_no_new_trains() {
    let source = Arc::new(FakeSource::new());
    let coordinator = ScanCoordinator::new(Arc::new(pipeline(source.clone()).await), 4);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let summary = coordinator.run(0..1000, cancel, |_| {}).await;

    assert_eq!(summary.processed, 0);
    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn empty_range_finishes_immediately() {
    let source = Arc::new(FakeSource::new());
    let coordinator = ScanCoordinator::new(Arc::new(pipeline(source).await), 3);

    let summary = coordinator
        .run(50..50, CancellationToken::new(), |_| {})
        .await;

    assert_eq!(summary.processed, 0);
}
