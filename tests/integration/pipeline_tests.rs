//! Engine properties exercised through stub collaborators

use crate::common::{coordinator, page, test_engine, RecordingSink, StubTransport};
use std::sync::Arc;
use std::time::{Duration, Instant};
use sumi_harvest::{FetchError, HarvestError, RunState, Task};

#[tokio::test]
async fn test_single_record_run() {
    let transport = Arc::new(StubTransport::new().with_page(page("p/1"), "record sku-1"));
    let sink = Arc::new(RecordingSink::default());
    let mut coordinator = coordinator(test_engine(2, 2, 8), transport.clone(), sink.clone());

    let summary = coordinator.run(vec![Task::item(page("p/1"))]).await.unwrap();

    assert_eq!(coordinator.state(), RunState::Done);
    assert_eq!(sink.identities(), vec!["sku-1"]);
    assert_eq!(summary.records_emitted, 1);
    assert_eq!(summary.tasks_completed, 1);
    assert_eq!(summary.tasks_abandoned, 0);
    assert!(summary.is_clean());
    assert!(sink.finished().is_some());
}

#[tokio::test]
async fn test_composite_children_become_records() {
    let transport = Arc::new(
        StubTransport::new()
            .with_page(
                page("set/1"),
                format!("composite {} {} {}", page("p/a"), page("p/b"), page("p/c")),
            )
            .with_page(page("p/a"), "record a")
            .with_page(page("p/b"), "record b")
            .with_page(page("p/c"), "record c"),
    );
    let sink = Arc::new(RecordingSink::default());
    let mut coordinator = coordinator(test_engine(2, 2, 8), transport, sink.clone());

    let summary = coordinator.run(vec![Task::item(page("set/1"))]).await.unwrap();

    assert_eq!(sink.identities(), vec!["a", "b", "c"]);
    assert_eq!(summary.records_emitted, 3);
    assert_eq!(summary.tasks_expanded, 1);
    assert_eq!(summary.tasks_completed, 4);
    assert_eq!(summary.tasks_abandoned, 0);
}

#[tokio::test]
async fn test_transient_failure_exhausts_retries() {
    let transport = Arc::new(StubTransport::new().with_failure(page("p/1"), FetchError::Timeout));
    let sink = Arc::new(RecordingSink::default());
    let engine = test_engine(1, 1, 4).with_retries(2);
    let mut coordinator = coordinator(engine, transport.clone(), sink.clone());

    let summary = coordinator.run(vec![Task::item(page("p/1"))]).await.unwrap();

    // One first attempt plus two retries
    assert_eq!(transport.calls(&page("p/1")), 3);
    assert_eq!(sink.len(), 0);
    assert_eq!(summary.tasks_failed, 1);
    assert_eq!(summary.tasks_abandoned, 0);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].error_kind, "transient");
    assert_eq!(summary.failures[0].attempts, 3);
}

#[tokio::test]
async fn test_shared_child_fetched_once() {
    let shared = page("p/shared");
    let transport = Arc::new(
        StubTransport::new()
            .with_page(page("list/1"), format!("list {} {}", shared, page("p/x1")))
            .with_page(page("list/2"), format!("list {} {}", page("p/x2"), shared))
            .with_page(&shared, "record shared")
            .with_page(page("p/x1"), "record x1")
            .with_page(page("p/x2"), "record x2"),
    );
    let sink = Arc::new(RecordingSink::default());
    let mut coordinator = coordinator(test_engine(4, 2, 8), transport.clone(), sink.clone());

    let summary = coordinator
        .run(vec![
            Task::discovery(page("list/1")),
            Task::discovery(page("list/2")),
        ])
        .await
        .unwrap();

    assert_eq!(transport.calls(&shared), 1);
    assert_eq!(sink.identities(), vec!["shared", "x1", "x2"]);
    assert_eq!(summary.duplicate_tasks, 1);
    assert_eq!(summary.tasks_expanded, 2);
    assert_eq!(summary.tasks_completed, 5);
}

#[tokio::test]
async fn test_equivalent_references_share_an_identity() {
    let transport = Arc::new(StubTransport::new().with_page(page("p/1"), "record one"));
    let sink = Arc::new(RecordingSink::default());
    let mut coordinator = coordinator(test_engine(2, 1, 8), transport.clone(), sink.clone());

    let summary = coordinator
        .run(vec![
            Task::item(page("p/1")),
            Task::item("https://www.catalog.test/p/1/"),
            Task::item("https://CATALOG.test/p/1#specs"),
        ])
        .await
        .unwrap();

    assert_eq!(transport.total_calls(), 1);
    assert_eq!(summary.duplicate_tasks, 2);
    assert_eq!(summary.records_emitted, 1);
}

#[tokio::test]
async fn test_duplicate_records_dropped() {
    let transport = Arc::new(
        StubTransport::new()
            .with_page(page("p/1"), "record same")
            .with_page(page("p/2"), "record same"),
    );
    let sink = Arc::new(RecordingSink::default());
    let mut coordinator = coordinator(test_engine(2, 2, 8), transport, sink.clone());

    let summary = coordinator
        .run(vec![Task::item(page("p/1")), Task::item(page("p/2"))])
        .await
        .unwrap();

    assert_eq!(sink.identities(), vec!["same"]);
    assert_eq!(summary.records_emitted, 1);
    assert_eq!(summary.duplicate_records, 1);
    assert_eq!(summary.duplicates_dropped(), 1);
    assert_eq!(summary.tasks_completed, 2);
}

#[tokio::test]
async fn test_fetch_concurrency_is_bounded() {
    let mut transport = StubTransport::new().with_delay(Duration::from_millis(20));
    let mut roots = Vec::new();
    for i in 0..40 {
        let reference = page(&format!("p/{}", i));
        transport = transport.with_page(&reference, "record");
        roots.push(Task::item(reference));
    }
    let transport = Arc::new(transport);
    let sink = Arc::new(RecordingSink::default());
    let mut coordinator = coordinator(test_engine(3, 2, 8), transport.clone(), sink.clone());

    let summary = coordinator.run(roots).await.unwrap();

    assert_eq!(summary.records_emitted, 40);
    assert!(transport.peak() <= 3, "peak was {}", transport.peak());
    assert!(transport.peak() >= 1);
}

#[tokio::test]
async fn test_repeated_runs_emit_the_same_records() {
    let transport = Arc::new(
        StubTransport::new()
            .with_page(page("list/1"), format!("list {} {}", page("set/1"), page("p/3")))
            .with_page(page("set/1"), format!("composite {} {}", page("p/1"), page("p/2")))
            .with_page(page("p/1"), "record")
            .with_page(page("p/2"), "record")
            .with_page(page("p/3"), "record"),
    );
    let roots = vec![Task::discovery(page("list/1"))];

    let first = Arc::new(RecordingSink::default());
    coordinator(test_engine(3, 2, 2), transport.clone(), first.clone())
        .run(roots.clone())
        .await
        .unwrap();

    let second = Arc::new(RecordingSink::default());
    coordinator(test_engine(1, 1, 1), transport, second.clone())
        .run(roots)
        .await
        .unwrap();

    assert_eq!(first.identities().len(), 3);
    assert_eq!(first.identities(), second.identities());
}

#[tokio::test]
async fn test_permanent_failure_not_retried() {
    // Unknown references answer 404
    let transport = Arc::new(StubTransport::new());
    let sink = Arc::new(RecordingSink::default());
    let mut coordinator = coordinator(test_engine(1, 1, 4).with_retries(5), transport.clone(), sink);

    let summary = coordinator.run(vec![Task::item(page("gone"))]).await.unwrap();

    assert_eq!(transport.calls(&page("gone")), 1);
    assert_eq!(summary.tasks_failed, 1);
    assert_eq!(summary.failures[0].error_kind, "permanent");
    assert_eq!(summary.failures[0].attempts, 1);
    assert_eq!(summary.tasks_abandoned, 0);
}

#[tokio::test]
async fn test_flaky_page_recovers_within_retries() {
    let transport = Arc::new(
        StubTransport::new()
            .with_page(page("p/1"), "record flaky")
            .with_flaky(page("p/1"), 2),
    );
    let sink = Arc::new(RecordingSink::default());
    let engine = test_engine(1, 1, 4).with_retries(3);
    let mut coordinator = coordinator(engine, transport.clone(), sink.clone());

    let summary = coordinator.run(vec![Task::item(page("p/1"))]).await.unwrap();

    assert_eq!(transport.calls(&page("p/1")), 3);
    assert_eq!(sink.identities(), vec!["flaky"]);
    assert_eq!(summary.tasks_failed, 0);
}

#[tokio::test]
async fn test_slow_fetch_times_out_per_attempt() {
    let transport = Arc::new(
        StubTransport::new()
            .with_page(page("p/1"), "record")
            .with_delay(Duration::from_millis(500)),
    );
    let sink = Arc::new(RecordingSink::default());
    let engine = test_engine(1, 1, 4)
        .with_retries(1)
        .with_timeout(Duration::from_millis(50));
    let mut coordinator = coordinator(engine, transport.clone(), sink.clone());

    let summary = coordinator.run(vec![Task::item(page("p/1"))]).await.unwrap();

    assert_eq!(transport.calls(&page("p/1")), 2);
    assert_eq!(sink.len(), 0);
    assert_eq!(summary.failures[0].error_kind, "transient");
    assert_eq!(summary.failures[0].attempts, 2);
}

#[tokio::test]
async fn test_extraction_errors_stay_with_their_task() {
    let transport = Arc::new(
        StubTransport::new()
            .with_page(
                page("list/1"),
                format!("list {} {} {}", page("p/broken"), page("p/panic"), page("p/ok")),
            )
            .with_page(page("p/broken"), "broken")
            .with_page(page("p/panic"), "panic")
            .with_page(page("p/ok"), "record ok"),
    );
    let sink = Arc::new(RecordingSink::default());
    let mut coordinator = coordinator(test_engine(2, 2, 8), transport, sink.clone());

    let summary = coordinator
        .run(vec![Task::discovery(page("list/1"))])
        .await
        .unwrap();

    assert_eq!(sink.identities(), vec!["ok"]);
    assert_eq!(summary.tasks_failed, 2);
    assert!(summary.failures.iter().all(|f| f.error_kind == "extraction"));
    assert_eq!(summary.tasks_completed, 4);
    assert_eq!(summary.tasks_abandoned, 0);
}

#[tokio::test]
async fn test_empty_page_completes() {
    let transport = Arc::new(
        StubTransport::new()
            .with_page(page("p/1"), "empty")
            .with_page(page("list/empty"), "nothing here"),
    );
    let sink = Arc::new(RecordingSink::default());
    let mut coordinator = coordinator(test_engine(1, 1, 4), transport, sink.clone());

    let summary = coordinator
        .run(vec![
            Task::item(page("p/1")),
            Task::discovery(page("list/empty")),
        ])
        .await
        .unwrap();

    assert_eq!(sink.len(), 0);
    assert_eq!(summary.empty_results, 2);
    assert_eq!(summary.tasks_completed, 2);
}

#[tokio::test]
async fn test_sink_error_is_not_fatal_by_default() {
    let transport = Arc::new(
        StubTransport::new()
            .with_page(page("p/1"), "record sku-1")
            .with_page(page("p/2"), "record sku-2")
            .with_page(page("p/3"), "record sku-3"),
    );
    let sink = Arc::new(RecordingSink::rejecting("sku-2"));
    let mut coordinator = coordinator(test_engine(2, 2, 8), transport, sink.clone());

    let summary = coordinator
        .run(vec![
            Task::item(page("p/1")),
            Task::item(page("p/2")),
            Task::item(page("p/3")),
        ])
        .await
        .unwrap();

    assert_eq!(sink.identities(), vec!["sku-1", "sku-3"]);
    assert_eq!(summary.records_emitted, 3);
    assert_eq!(summary.sink_errors, 1);
    assert_eq!(summary.tasks_failed, 0);
    assert_eq!(summary.tasks_abandoned, 0);
}

#[tokio::test]
async fn test_fatal_sink_error_aborts_run() {
    let transport = Arc::new(StubTransport::new().with_page(page("p/1"), "record sku-1"));
    let sink = Arc::new(RecordingSink::rejecting("sku-1"));
    let engine = test_engine(1, 1, 4).with_sink_errors_fatal(true);
    let mut coordinator = coordinator(engine, transport, sink.clone());

    let result = coordinator.run(vec![Task::item(page("p/1"))]).await;

    assert!(matches!(result, Err(HarvestError::Sink(_))));
    assert_eq!(coordinator.state(), RunState::Done);
    assert!(sink.finished().is_some());
}

#[tokio::test]
async fn test_slow_extraction_holds_back_fetchers() {
    let mut transport = StubTransport::new();
    let mut roots = Vec::new();
    for i in 0..50 {
        let reference = page(&format!("p/{}", i));
        transport = transport.with_page(&reference, "record");
        roots.push(Task::item(reference));
    }
    let transport = Arc::new(transport);
    let sink = Arc::new(RecordingSink::stalled());
    let (fetchers, extractors, handoff) = (2, 1, 1);
    let engine = test_engine(fetchers, extractors, 64)
        .with_handoff_capacity(handoff)
        .with_timeout(Duration::from_secs(10));
    let mut coordinator = coordinator(engine, transport.clone(), sink.clone());

    let observe = async {
        tokio::time::sleep(Duration::from_millis(300)).await;
        let stalled = (transport.total_calls(), sink.len());
        sink.release();
        stalled
    };
    let (result, (calls_while_stalled, emitted_while_stalled)) =
        tokio::join!(coordinator.run(roots), observe);

    // One document in the extractor, one in the handoff, one per blocked fetcher
    assert!(calls_while_stalled <= fetchers + handoff + extractors);
    assert_eq!(emitted_while_stalled, 0);

    let summary = result.unwrap();
    assert_eq!(summary.records_emitted, 50);
    assert_eq!(transport.total_calls(), 50);
}

#[tokio::test]
async fn test_cancellation_stops_run_within_grace() {
    let mut transport = StubTransport::new().with_delay(Duration::from_millis(100));
    let mut roots = Vec::new();
    for i in 0..50 {
        let reference = page(&format!("p/{}", i));
        transport = transport.with_page(&reference, "record");
        roots.push(Task::item(reference));
    }
    let sink = Arc::new(RecordingSink::default());
    let mut coordinator = coordinator(test_engine(2, 2, 64), Arc::new(transport), sink.clone());

    let cancel = coordinator.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(250)).await;
        cancel.cancel();
    });

    let started = Instant::now();
    let summary = coordinator.run(roots).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(summary.cancelled);
    assert!(summary.tasks_abandoned > 0);
    assert_eq!(summary.records_emitted + summary.tasks_abandoned, 50);
    assert_eq!(sink.len(), summary.records_emitted);
    assert!(sink.finished().unwrap().cancelled);
}

#[tokio::test]
async fn test_cancelled_before_start_abandons_roots() {
    let transport = Arc::new(StubTransport::new().with_page(page("p/1"), "record"));
    let sink = Arc::new(RecordingSink::default());
    let mut coordinator = coordinator(test_engine(1, 1, 4), transport.clone(), sink.clone());
    coordinator.cancellation_token().cancel();

    let summary = coordinator
        .run(vec![Task::item(page("p/1")), Task::item(page("p/2"))])
        .await
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.tasks_abandoned, 2);
    assert_eq!(transport.total_calls(), 0);
    assert_eq!(sink.len(), 0);
}

#[tokio::test]
async fn test_deep_composite_chain() {
    const DEPTH: usize = 60;
    let mut transport = StubTransport::new();
    for level in 0..DEPTH {
        let body = if level + 1 == DEPTH {
            "record bottom".to_string()
        } else {
            format!("composite {}", page(&format!("level/{}", level + 1)))
        };
        transport = transport.with_page(page(&format!("level/{}", level)), body);
    }
    let sink = Arc::new(RecordingSink::default());
    let mut coordinator = coordinator(test_engine(2, 2, 1), Arc::new(transport), sink.clone());

    let summary = coordinator
        .run(vec![Task::item(page("level/0"))])
        .await
        .unwrap();

    assert_eq!(sink.identities(), vec!["bottom"]);
    assert_eq!(summary.tasks_expanded, DEPTH - 1);
    assert_eq!(summary.tasks_completed, DEPTH);
}

#[tokio::test]
async fn test_large_fan_out_with_tiny_capacity() {
    const SETS: usize = 50;
    let mut transport = StubTransport::new();
    let mut listing = vec!["list".to_string()];
    for set in 0..SETS {
        let set_ref = page(&format!("set/{}", set));
        let children: Vec<String> = (0..3).map(|c| page(&format!("p/{}/{}", set, c))).collect();
        for child in &children {
            transport = transport.with_page(child, "record");
        }
        transport = transport.with_page(&set_ref, format!("composite {}", children.join(" ")));
        listing.push(set_ref);
    }
    transport = transport.with_page(page("list/all"), listing.join(" "));

    let engine = test_engine(2, 1, 2)
        .with_handoff_capacity(1)
        .with_overflow_wait(Duration::from_millis(2));
    let sink = Arc::new(RecordingSink::default());
    let mut coordinator = coordinator(engine, Arc::new(transport), sink.clone());

    let summary = tokio::time::timeout(
        Duration::from_secs(20),
        coordinator.run(vec![Task::discovery(page("list/all"))]),
    )
    .await
    .expect("run deadlocked")
    .unwrap();

    assert_eq!(summary.records_emitted, SETS * 3);
    assert_eq!(summary.tasks_completed, 1 + SETS + SETS * 3);
    assert_eq!(summary.tasks_abandoned, 0);
}

#[tokio::test]
async fn test_concurrent_runs_do_not_interfere() {
    let transport = Arc::new(
        StubTransport::new()
            .with_page(page("list/1"), format!("list {} {}", page("p/1"), page("p/2")))
            .with_page(page("p/1"), "record one")
            .with_page(page("p/2"), "record two"),
    );
    let roots = vec![Task::discovery(page("list/1"))];

    let first_sink = Arc::new(RecordingSink::default());
    let second_sink = Arc::new(RecordingSink::default());
    let mut first = coordinator(test_engine(2, 1, 4), transport.clone(), first_sink.clone());
    let mut second = coordinator(test_engine(2, 1, 4), transport.clone(), second_sink.clone());

    let (a, b) = tokio::join!(first.run(roots.clone()), second.run(roots));
    a.unwrap();
    b.unwrap();

    assert_eq!(first_sink.identities(), vec!["one", "two"]);
    assert_eq!(second_sink.identities(), vec!["one", "two"]);
    assert_eq!(transport.total_calls(), 6);
}
