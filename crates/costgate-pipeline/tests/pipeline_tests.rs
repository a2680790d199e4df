// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end pipeline tests over the test harness.

use std::time::Duration;

use costgate_cache::CacheHit;
use costgate_core::{BackendDescriptor, Clock, CostgateError};
use costgate_cost::{AlertLevel, PeriodKind};
use costgate_pipeline::{PipelineRequest, ResponseSource, run_maintenance, spawn_maintenance};
use costgate_test_utils::TestHarness;
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

fn backend(id: &str, input: f64, output: f64, compliant: bool) -> BackendDescriptor {
    BackendDescriptor {
        id: id.into(),
        input_unit_cost: input,
        output_unit_cost: output,
        max_context_tokens: 8_192,
        compliance_eligible: compliant,
        capability_rank: 1,
    }
}

#[tokio::test]
async fn miss_then_exact_hit() {
    let harness = TestHarness::builder()
        .with_mock_responses(vec!["Paris".into()])
        .build()
        .await
        .unwrap();

    let first = harness.send("What is the capital of France?").await.unwrap();
    assert_eq!(first.text, "Paris");
    assert_eq!(first.source, ResponseSource::Backend);
    assert_eq!(first.backend_id, "local-small");
    assert!(first.cost_usd > 0.0);
    assert!(first.ledger_error.is_none());
    assert_eq!(first.received_at, harness.clock.now());

    let second = harness.send("What is the capital of France?").await.unwrap();
    assert_eq!(second.text, "Paris");
    assert_eq!(
        second.source,
        ResponseSource::Cache {
            hit: CacheHit::Exact
        }
    );
    assert_eq!(second.cost_usd, 0.0);
    assert!(second.routing.is_none());
    assert_eq!(second.cache_key, first.cache_key);

    assert_eq!(harness.backend.call_count(), 1);
    let summary = harness.ledger.summary().await.unwrap();
    assert_eq!(summary.total_calls, 2);
    assert_eq!(summary.cached_calls, 1);
    assert!((summary.total_spend - first.cost_usd).abs() < 1e-12);
}

#[tokio::test]
async fn near_duplicate_is_a_semantic_hit() {
    let harness = TestHarness::builder()
        .with_mock_responses(vec!["Use the reset link.".into()])
        .build()
        .await
        .unwrap();

    harness.send("how do I reset my password").await.unwrap();
    let response = harness.send("how do I reset my password please").await.unwrap();

    match response.source {
        ResponseSource::Cache {
            hit: CacheHit::Semantic { similarity },
        } => assert!(similarity >= 0.85),
        other => panic!("expected semantic hit, got {other:?}"),
    }
    assert_eq!(response.text, "Use the reset link.");
    assert_eq!(harness.backend.call_count(), 1);
}

#[tokio::test]
async fn expired_entry_calls_backend_again() {
    let harness = TestHarness::builder().without_semantic().build().await.unwrap();

    harness.send("What is the capital of France?").await.unwrap();
    harness.clock.advance(chrono::Duration::days(7));
    let at_ttl = harness.send("What is the capital of France?").await.unwrap();
    assert_eq!(
        at_ttl.source,
        ResponseSource::Cache {
            hit: CacheHit::Exact
        }
    );

    harness.clock.advance(chrono::Duration::seconds(1));
    let again = harness.send("What is the capital of France?").await.unwrap();

    assert_eq!(again.source, ResponseSource::Backend);
    assert_eq!(harness.backend.call_count(), 2);
}

#[tokio::test]
async fn context_is_sent_with_the_text() {
    let harness = TestHarness::builder().build().await.unwrap();

    harness
        .send_request(PipelineRequest::new("Review this").with_context("fn main() {}"))
        .await
        .unwrap();

    assert_eq!(
        harness.backend.received_texts().await,
        vec!["Review this\n\nfn main() {}".to_string()]
    );
}

#[tokio::test]
async fn secrets_are_anonymized_before_the_backend() {
    let harness = TestHarness::builder().build().await.unwrap();

    harness
        .send("Why does login fail for jane@example.com?")
        .await
        .unwrap();

    let texts = harness.backend.received_texts().await;
    assert_eq!(texts, vec!["Why does login fail for [EMAIL]?".to_string()]);
}

#[tokio::test]
async fn compliance_request_skips_cheaper_ineligible_backend() {
    let harness = TestHarness::builder()
        .with_catalog(vec![
            backend("a", 0.001, 0.001, false),
            backend("b", 0.01, 0.01, true),
        ])
        .build()
        .await
        .unwrap();

    let response = harness
        .send("Summarize our GDPR obligations for customer records")
        .await
        .unwrap();

    assert!(response.score.compliance_required());
    assert_eq!(response.backend_id, "b");
    assert_eq!(harness.backend.called_backends().await, vec!["b"]);
}

#[tokio::test]
async fn no_eligible_backend_aborts_before_any_call() {
    let harness = TestHarness::builder()
        .with_catalog(vec![backend("a", 0.001, 0.001, false)])
        .build()
        .await
        .unwrap();

    let err = harness
        .send("Summarize our GDPR obligations for customer records")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CostgateError::NoEligibleBackend {
            compliance_required: true,
            ..
        }
    ));
    assert_eq!(harness.backend.call_count(), 0);
    assert_eq!(harness.recorded_calls().await.unwrap(), 0);
    assert!(harness.cache.is_empty());
}

#[tokio::test]
async fn requested_backend_class_is_honoured() {
    let harness = TestHarness::builder().build().await.unwrap();

    let response = harness
        .send_request(
            PipelineRequest::new("What is the capital of France?")
                .with_backend_class("frontier-large"),
        )
        .await
        .unwrap();

    assert_eq!(response.backend_id, "frontier-large");
}

#[tokio::test]
async fn blank_request_is_rejected() {
    let harness = TestHarness::builder().build().await.unwrap();

    let err = harness.send("   ").await.unwrap_err();

    assert!(matches!(err, CostgateError::Validation(_)));
    assert_eq!(harness.backend.call_count(), 0);
}

#[tokio::test]
async fn backend_failure_records_nothing() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.backend.add_failure(503, "overloaded").await;

    let err = harness.send("What is the capital of France?").await.unwrap_err();

    assert!(matches!(err, CostgateError::Backend { status: 503, .. }));
    assert_eq!(harness.recorded_calls().await.unwrap(), 0);
    assert!(harness.cache.is_empty());
}

#[tokio::test(start_paused = true)]
async fn timeout_leaves_cache_and_ledger_untouched() {
    let harness = TestHarness::builder()
        .with_backend_delay(Duration::from_secs(10))
        .with_timeout(1)
        .build()
        .await
        .unwrap();

    let err = harness.send("What is the capital of France?").await.unwrap_err();

    assert!(matches!(err, CostgateError::Timeout { .. }));
    assert_eq!(harness.recorded_calls().await.unwrap(), 0);
    assert!(harness.cache.is_empty());
}

#[tokio::test]
async fn cancelled_request_leaves_cache_and_ledger_untouched() {
    let harness = TestHarness::builder()
        .with_backend_delay(Duration::from_secs(30))
        .build()
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    let pipeline = harness.pipeline.clone();
    let token = cancel.clone();
    let task = tokio::spawn(async move {
        pipeline
            .handle(PipelineRequest::new("What is the capital of France?"), &token)
            .await
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();
    let err = task.await.unwrap().unwrap_err();

    assert!(matches!(err, CostgateError::Cancelled));
    assert_eq!(harness.recorded_calls().await.unwrap(), 0);
    assert!(harness.cache.is_empty());
}

#[tokio::test]
async fn already_cancelled_token_short_circuits() {
    let harness = TestHarness::builder().build().await.unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = harness
        .pipeline
        .handle(PipelineRequest::new("hello"), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, CostgateError::Cancelled));
    assert_eq!(harness.backend.call_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_misses_share_one_backend_call() {
    let harness = TestHarness::builder()
        .with_mock_responses(vec!["shared".into()])
        .with_backend_delay(Duration::from_millis(300))
        .build()
        .await
        .unwrap();

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let pipeline = harness.pipeline.clone();
            tokio::spawn(async move {
                pipeline
                    .handle(
                        PipelineRequest::new("Explain the borrow checker"),
                        &CancellationToken::new(),
                    )
                    .await
            })
        })
        .collect();
    let responses: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .collect();

    assert_eq!(harness.backend.call_count(), 1);
    assert!(responses.iter().all(|r| r.text == "shared"));
    let from_backend = responses
        .iter()
        .filter(|r| r.source == ResponseSource::Backend)
        .count();
    assert_eq!(from_backend, 1);

    let summary = harness.ledger.summary().await.unwrap();
    assert_eq!(summary.total_calls, 5);
    assert_eq!(summary.cached_calls, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn without_coalescing_each_miss_calls_the_backend() {
    let harness = TestHarness::builder()
        .with_backend_delay(Duration::from_millis(300))
        .without_coalescing()
        .build()
        .await
        .unwrap();

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let pipeline = harness.pipeline.clone();
            tokio::spawn(async move {
                pipeline
                    .handle(
                        PipelineRequest::new("Explain the borrow checker"),
                        &CancellationToken::new(),
                    )
                    .await
            })
        })
        .collect();
    for handle in futures::future::join_all(handles).await {
        handle.unwrap().unwrap();
    }

    assert_eq!(harness.backend.call_count(), 3);
}

#[tokio::test]
#[traced_test]
async fn ledger_failure_still_returns_response() {
    let harness = TestHarness::builder()
        .with_mock_responses(vec!["Paris".into()])
        .build()
        .await
        .unwrap();
    harness.break_ledger().await.unwrap();

    let response = harness.send("What is the capital of France?").await.unwrap();

    assert_eq!(response.text, "Paris");
    assert!(matches!(
        response.ledger_error,
        Some(CostgateError::Storage { .. })
    ));
    assert!(logs_contain("ledger write failed"));
    // The response is still cached.
    assert_eq!(harness.cache.len(), 1);
}

#[tokio::test]
async fn crossing_a_threshold_reports_the_alert() {
    // 100 input + 50 output tokens at these prices cost exactly $1.
    let harness = TestHarness::builder()
        .with_catalog(vec![backend("pricey", 5.0, 10.0, false)])
        .with_budget(1.5)
        .build()
        .await
        .unwrap();
    let mut alerts = harness.ledger.subscribe();

    let response = harness.send("What is the capital of France?").await.unwrap();

    assert!((response.cost_usd - 1.0).abs() < 1e-9);
    assert_eq!(response.alerts.len(), 1);
    assert_eq!(response.alerts[0].period, PeriodKind::Daily);
    assert_eq!(response.alerts[0].level, AlertLevel::Threshold(0.5));
    assert_eq!(alerts.recv().await.unwrap(), response.alerts[0]);
}

#[tokio::test]
async fn maintenance_pass_evicts_expired_entries() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.send("What is the capital of France?").await.unwrap();
    assert_eq!(harness.cache.len(), 1);

    harness.clock.advance(chrono::Duration::days(8));
    run_maintenance(&harness.cache, &harness.ledger).await;

    assert!(harness.cache.is_empty());
}

#[tokio::test]
async fn maintenance_task_stops_on_cancel() {
    let harness = TestHarness::builder().build().await.unwrap();
    let cancel = CancellationToken::new();
    let handle = spawn_maintenance(
        harness.cache.clone(),
        harness.ledger.clone(),
        Duration::from_secs(3600),
        cancel.clone(),
    );

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("maintenance should stop promptly")
        .unwrap();
}
