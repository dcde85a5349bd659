// ==========================================
// BatchOrchestrator 集成测试
// ==========================================
// 测试目标: 状态机、分块无关性、重试与中止、取消、进度通知
// ==========================================


use roster_ingest::domain::types::{FieldType, NormalizationStrategy};
use roster_ingest::engine::{BatchOrchestrator, CancellationFlag};
use roster_ingest::repository::InMemoryRecordSource;
use roster_ingest::{
    logging, BatchConfig, BatchState, ExistingRecord, FieldSpec, FieldWeight, MatchingConfig,
    RawRow, ResolutionOutcome, Schema, ViolationKind,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use test_helpers::{
    existing_member, fast_batch, generated_rows, member_matching, member_row, member_schema,
    small_corpus, FlakySource,
};

fn orchestrator<S>(
    source: S,
    blocking_field: Option<&str>,
    batch: BatchConfig,
) -> BatchOrchestrator<S>
where
    S: roster_ingest::ExistingRecordSource + 'static,
{
    BatchOrchestrator::new(
        member_schema(),
        member_matching(blocking_field),
        batch,
        Arc::new(source),
    )
    .expect("Failed to create orchestrator")
}

#[tokio::test]
async fn test_end_to_end_scenario() {
    logging::init_test();

    let source = InMemoryRecordSource::new(vec![existing_member(
        "E1",
        "John",
        "Smith",
        "jsmith@x.com",
    )]);
    let orchestrator = orchestrator(source, Some("lastName"), fast_batch(500));

    let rows = vec![
        member_row(1, "John", "Smith", "jsmith@x.com"),
        member_row(2, "", "Doe", "d@x.com"),
    ];
    let report = orchestrator.run(rows).await.unwrap();

    assert_eq!(report.state, BatchState::Completed);
    assert_eq!(report.counts.total, 2);
    assert_eq!(report.counts.processed, 2);
    assert_eq!(report.counts.accepted, 1);
    assert_eq!(report.counts.rejected, 1);
    assert_eq!(report.counts.flagged_duplicate, 1);
    assert!(report.counts.is_consistent());

    let result = report.resolutions[0].outcome.result().unwrap();
    assert_eq!(result.candidates.len(), 1);
    assert_eq!(result.candidates[0].existing_id, "E1");
    assert_eq!(result.candidates[0].score, 1.0);

    let rejected = &report.rejected[0];
    assert_eq!(rejected.position(), 2);
    assert_eq!(rejected.violations.len(), 1);
    assert_eq!(rejected.violations[0].field, "firstName");
    assert_eq!(rejected.violations[0].kind, ViolationKind::MissingField);
}

#[tokio::test]
async fn test_empty_corpus_never_errors() {
    let orchestrator = orchestrator(InMemoryRecordSource::default(), None, fast_batch(4));

    let report = orchestrator.run(generated_rows(10)).await.unwrap();

    assert_eq!(report.state, BatchState::Completed);
    assert_eq!(report.counts.accepted, 10);
    assert_eq!(report.counts.flagged_duplicate, 0);
    assert!(report
        .resolutions
        .iter()
        .all(|r| r.outcome.result().map_or(false, |res| res.candidates.is_empty())));
}

#[tokio::test]
async fn test_results_independent_of_chunk_size() {
    // 每 5 行对应一位既有会员，另有若干非法行
    let corpus: Vec<_> = (1..=23)
        .filter(|k| k % 5 == 0)
        .map(|k| {
            existing_member(
                &format!("E{}", k),
                &format!("Member{}", k),
                &format!("Family{}", k % 7),
                &format!("member{}@x.com", k),
            )
        })
        .collect();
    let mut rows = generated_rows(23);
    rows[3] = member_row(4, "Member4", "Family4", "not-an-email");
    rows[11] = member_row(12, "", "", "");

    let mut baseline = None;
    for chunk_size in [1, 5, 23, 100] {
        let orchestrator = orchestrator(
            InMemoryRecordSource::new(corpus.clone()),
            Some("lastName"),
            fast_batch(chunk_size),
        );
        let report = orchestrator.run(rows.clone()).await.unwrap();

        assert_eq!(report.state, BatchState::Completed);
        assert_eq!(report.counts.processed, 23);
        assert_eq!(report.counts.rejected, 2);
        assert_eq!(report.counts.flagged_duplicate, 4);

        // 输出顺序与输入顺序一致
        let positions: Vec<usize> = report.resolutions.iter().map(|r| r.record.position).collect();
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted);

        let snapshot = (report.counts, report.rejected, report.resolutions);
        match &baseline {
            None => baseline = Some(snapshot),
            Some(expected) => assert_eq!(&snapshot, expected, "chunk_size={}", chunk_size),
        }
    }
}

#[tokio::test]
async fn test_source_recovers_within_retry_budget() {
    let source = Arc::new(FlakySource::failing_first(small_corpus(), 2));
    let orchestrator = BatchOrchestrator::new(
        member_schema(),
        member_matching(None),
        fast_batch(10),
        Arc::clone(&source),
    )
    .unwrap();

    let report = orchestrator
        .run(vec![member_row(1, "John", "Smith", "jsmith@x.com")])
        .await
        .unwrap();

    assert_eq!(source.calls(), 3);
    assert_eq!(report.counts.unresolved, 0);
    assert_eq!(report.counts.flagged_duplicate, 1);
}

#[tokio::test]
async fn test_exhausted_retries_mark_chunk_unresolved() {
    let source = Arc::new(FlakySource::always_failing());
    let orchestrator = BatchOrchestrator::new(
        member_schema(),
        member_matching(None),
        fast_batch(2),
        Arc::clone(&source),
    )
    .unwrap();

    let mut rows = generated_rows(4);
    rows.push(member_row(5, "", "Nobody", "n@x.com"));
    let report = orchestrator.run(rows).await.unwrap();

    assert_eq!(report.state, BatchState::Completed);
    assert_eq!(report.counts.unresolved, 4);
    assert_eq!(report.counts.accepted, 0);
    assert_eq!(report.counts.rejected, 1);
    assert_eq!(report.counts.processed, 5);
    assert!(report.counts.is_consistent());
    // 两个含已接受记录的块，每块 3 次尝试
    assert_eq!(source.calls(), 6);
    assert!(report.resolutions.iter().all(|r| matches!(
        r.outcome,
        ResolutionOutcome::UnresolvedDueToSourceFailure { .. }
    )));
}

#[tokio::test]
async fn test_fail_fast_aborts_after_failing_chunk() {
    let batch = BatchConfig {
        fail_fast_on_source_error: true,
        ..fast_batch(2)
    };
    let orchestrator = orchestrator(FlakySource::always_failing(), Some("lastName"), batch);

    let report = orchestrator.run(generated_rows(5)).await.unwrap();

    assert_eq!(report.state, BatchState::Aborted);
    assert!(report.abort_reason.is_some());
    assert_eq!(report.counts.total, 5);
    assert_eq!(report.counts.processed, 2);
    assert_eq!(report.counts.unresolved, 2);
    assert!(report.counts.is_consistent());
}

#[tokio::test]
async fn test_cancellation_at_chunk_boundary() {
    let flag = CancellationFlag::new();
    let cancel_on_progress = flag.clone();
    let orchestrator = orchestrator(small_corpus(), Some("lastName"), fast_batch(2))
        .with_cancellation(flag)
        .with_progress_sink(Arc::new(move |_processed: usize, _total: usize| {
            cancel_on_progress.cancel();
        }));

    let report = orchestrator.run(generated_rows(6)).await.unwrap();

    assert_eq!(report.state, BatchState::Cancelled);
    assert!(report.cancelled);
    assert_eq!(report.counts.processed, 2);
    assert_eq!(report.counts.total, 6);
    assert_eq!(report.resolutions.len(), 2);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let orchestrator = orchestrator(small_corpus(), None, fast_batch(2));
    orchestrator.cancellation_flag().cancel();

    let report = orchestrator.run(generated_rows(3)).await.unwrap();

    assert!(report.cancelled);
    assert_eq!(report.counts.processed, 0);
}

#[tokio::test]
async fn test_progress_reported_per_chunk() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&calls);
    let orchestrator = orchestrator(small_corpus(), Some("lastName"), fast_batch(3))
        .with_progress_sink(Arc::new(move |processed: usize, total: usize| {
            captured.lock().unwrap().push((processed, total));
        }));

    orchestrator.run(generated_rows(7)).await.unwrap();

    assert_eq!(*calls.lock().unwrap(), vec![(3, 7), (6, 7), (7, 7)]);
}

#[tokio::test]
async fn test_intra_batch_duplicates_across_chunks() {
    let batch = BatchConfig {
        batch_identity_field: Some("email".to_string()),
        ..fast_batch(2)
    };
    let orchestrator = orchestrator(InMemoryRecordSource::default(), None, batch);

    let rows = vec![
        member_row(1, "Ann", "Lee", "ann@x.com"),
        member_row(2, "Bob", "Ray", "bob@x.com"),
        member_row(3, "Ann", "Lee", "ANN@x.com"),
        member_row(4, "", "Lee", "ann@x.com"),
    ];
    let report = orchestrator.run(rows).await.unwrap();

    assert_eq!(report.intra_batch_duplicates.len(), 1);
    assert_eq!(report.intra_batch_duplicates[0].position, 3);
    assert_eq!(report.intra_batch_duplicates[0].first_position, 1);
    // 只登记，不影响计数
    assert_eq!(report.counts.accepted, 3);
    assert_eq!(report.counts.rejected, 1);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_applied_between_attempts() {
    let source = Arc::new(FlakySource::failing_first(small_corpus(), 2));
    let batch = BatchConfig {
        retry_attempts: 3,
        retry_backoff_ms: 250,
        ..fast_batch(10)
    };
    let orchestrator = BatchOrchestrator::new(
        member_schema(),
        member_matching(None),
        batch,
        Arc::clone(&source),
    )
    .unwrap();

    let started = tokio::time::Instant::now();
    let report = orchestrator
        .run(vec![member_row(1, "John", "Smith", "jsmith@x.com")])
        .await
        .unwrap();
    let elapsed = started.elapsed();

    // 三次尝试之间等待两次
    assert_eq!(source.calls(), 3);
    assert!(elapsed >= Duration::from_millis(500), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(750), "elapsed {:?}", elapsed);
    assert_eq!(report.counts.flagged_duplicate, 1);
}

#[tokio::test(start_paused = true)]
async fn test_non_retryable_source_error_not_retried() {
    let source = Arc::new(FlakySource::always_invalid());
    let batch = BatchConfig {
        retry_attempts: 3,
        retry_backoff_ms: 250,
        ..fast_batch(10)
    };
    let orchestrator = BatchOrchestrator::new(
        member_schema(),
        member_matching(Some("lastName")),
        batch,
        Arc::clone(&source),
    )
    .unwrap();

    let started = tokio::time::Instant::now();
    let report = orchestrator
        .run(vec![member_row(1, "John", "Smith", "jsmith@x.com")])
        .await
        .unwrap();

    assert_eq!(source.calls(), 1);
    assert!(started.elapsed() < Duration::from_millis(250));
    assert_eq!(report.state, BatchState::Completed);
    assert_eq!(report.counts.unresolved, 1);
    match &report.resolutions[0].outcome {
        ResolutionOutcome::UnresolvedDueToSourceFailure { reason } => {
            assert!(reason.contains("corrupt record"), "{}", reason)
        }
        other => panic!("应为未完成查重: {:?}", other),
    }
}

fn dues_schema() -> Schema {
    Schema::new(vec![
        FieldSpec::new("memberId", FieldType::Identifier, true),
        FieldSpec::new("joinedOn", FieldType::Date, true),
        FieldSpec::new("dues", FieldType::Numeric, true),
    ])
    .unwrap()
}

fn dues_matching(blocking_field: Option<&str>) -> MatchingConfig {
    MatchingConfig::new(
        vec![
            FieldWeight::new("joinedOn", 0.5, NormalizationStrategy::Exact),
            FieldWeight::new("dues", 0.5, NormalizationStrategy::Exact),
        ],
        0.5,
        blocking_field.map(str::to_string),
    )
    .unwrap()
}

#[tokio::test]
async fn test_identical_date_and_numeric_text_flagged() {
    let raw = [("joinedOn", "03/15/2024"), ("dues", "1,250.00")];

    for blocking in [None, Some("joinedOn"), Some("dues")] {
        let source = InMemoryRecordSource::new(vec![ExistingRecord::from_pairs("E1", raw)]);
        let orchestrator = BatchOrchestrator::new(
            dues_schema(),
            dues_matching(blocking),
            fast_batch(10),
            Arc::new(source),
        )
        .unwrap();

        let mut values: Vec<(&str, &str)> = raw.to_vec();
        values.push(("memberId", "M-1"));
        let report = orchestrator
            .run(vec![RawRow::from_pairs(1, values)])
            .await
            .unwrap();

        assert_eq!(report.counts.flagged_duplicate, 1, "blocking {:?}", blocking);
        let best = report.resolutions[0]
            .outcome
            .result()
            .and_then(|r| r.best())
            .cloned()
            .unwrap_or_else(|| panic!("blocking {:?} 无候选", blocking));
        assert_eq!(best.existing_id, "E1");
        assert_eq!(best.score, 1.0);
    }
}
