/*!
 * End-to-end batch behavior: events, retries, limits and cancellation
 */

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use qagen::generation::{run_batch, BatchEvent, BatchSummary, ProgressSnapshot};

use crate::common::{fast_config, work_items, RecordingPersist, ScriptedGenerator};

fn progress_events(events: &[BatchEvent<Vec<String>>]) -> Vec<&ProgressSnapshot> {
    events
        .iter()
        .filter_map(|event| match event {
            BatchEvent::Progress(snapshot) => Some(snapshot),
            _ => None,
        })
        .collect()
}

fn summary_of(events: &[BatchEvent<Vec<String>>]) -> &BatchSummary<Vec<String>> {
    match events.last() {
        Some(BatchEvent::Complete(summary)) => summary,
        other => panic!("expected a complete event last, got {:?}", other),
    }
}

#[tokio::test]
async fn test_runBatch_withAllSuccesses_shouldReportEveryItemThenComplete() {
    let generator = Arc::new(ScriptedGenerator::new());
    let persister = Arc::new(RecordingPersist::new());

    let stream = run_batch(
        work_items(5),
        fast_config(3),
        Arc::clone(&generator),
        Arc::clone(&persister),
        CancellationToken::new(),
    );
    let (events, summary) = stream.collect().await.unwrap();

    assert_eq!(events.len(), 6);
    let progress = progress_events(&events);
    assert_eq!(progress.len(), 5);
    assert!(progress.windows(2).all(|pair| pair[0].percentage <= pair[1].percentage));
    assert_eq!(progress.last().unwrap().percentage, 100);
    assert!(progress.iter().all(|snapshot| snapshot.total == 5));

    let terminal = summary_of(&events);
    assert_eq!(terminal.successful, 5);
    assert_eq!(terminal.failed, 0);
    assert_eq!(terminal.retried_count, 0);
    assert_eq!(terminal.passes, 1);
    assert!(!terminal.cancelled);
    assert_eq!(Some(terminal), summary.as_ref());

    let indices: Vec<usize> = terminal.outcomes.iter().map(|o| o.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    assert_eq!(persister.saved_indices(), vec![0, 1, 2, 3, 4]);
    assert_eq!(generator.calls(), 5);
}

#[tokio::test]
async fn test_runBatch_withPersistentFailures_shouldRetryUntilBudgetIsSpent() {
    let generator = Arc::new(ScriptedGenerator::failing([1, 3]));
    let persister = Arc::new(RecordingPersist::new());
    let config = fast_config(2).with_retry(true, 2);

    let (events, _) = run_batch(
        work_items(4),
        config,
        Arc::clone(&generator),
        Arc::clone(&persister),
        CancellationToken::new(),
    )
    .collect()
    .await
    .unwrap();

    // 4 first-pass completions, 2 per retry pass, one event per pass boundary
    assert_eq!(progress_events(&events).len(), 10);

    let summary = summary_of(&events);
    assert_eq!(summary.successful, 2);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.retried_count, 4);
    assert_eq!(summary.passes, 3);
    assert_eq!(summary.outcomes.len(), 4);

    let second = &summary.outcomes[1];
    assert!(!second.success);
    assert!(second.error_message.as_deref().unwrap().contains("attempt 3"));
    assert_eq!(second.error_kind.as_deref(), Some("failed"));

    assert_eq!(generator.attempts_for(0), 1);
    assert_eq!(generator.attempts_for(1), 3);
    assert_eq!(generator.attempts_for(3), 3);
    assert_eq!(persister.saved_indices(), vec![0, 2]);
}

#[tokio::test]
async fn test_runBatch_withNoItems_shouldEmitOnlyAnErrorEvent() {
    let generator = Arc::new(ScriptedGenerator::new());
    let persister = Arc::new(RecordingPersist::new());

    let (events, summary) = run_batch(
        Vec::new(),
        fast_config(3),
        Arc::clone(&generator),
        Arc::clone(&persister),
        CancellationToken::new(),
    )
    .collect()
    .await
    .unwrap();

    assert_eq!(events.len(), 1);
    match &events[0] {
        BatchEvent::Error(payload) => {
            assert!(payload.details.iter().any(|d| d.contains("No segments")));
        }
        other => panic!("expected an error event, got {:?}", other),
    }
    assert!(summary.is_none());
    assert_eq!(generator.calls(), 0);
    assert_eq!(persister.calls(), 0);
}

#[tokio::test]
async fn test_runBatch_withUnreachableBackend_shouldNotAttemptAnyItem() {
    let generator = Arc::new(ScriptedGenerator::unreachable());
    let persister = Arc::new(RecordingPersist::new());

    let (events, summary) = run_batch(
        work_items(3),
        fast_config(3),
        Arc::clone(&generator),
        Arc::clone(&persister),
        CancellationToken::new(),
    )
    .collect()
    .await
    .unwrap();

    assert_eq!(events.len(), 1);
    match &events[0] {
        BatchEvent::Error(payload) => {
            assert!(payload.message.contains("unreachable"));
            assert!(payload.details[0].contains("connection refused"));
        }
        other => panic!("expected an error event, got {:?}", other),
    }
    assert!(summary.is_none());
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn test_runBatch_withRetryDisabled_shouldRunSinglePass() {
    let generator = Arc::new(ScriptedGenerator::failing([0]));
    let config = fast_config(3).with_retry(false, 3);

    let (events, _) = run_batch(
        work_items(3),
        config,
        Arc::clone(&generator),
        Arc::new(RecordingPersist::new()),
        CancellationToken::new(),
    )
    .collect()
    .await
    .unwrap();

    let summary = summary_of(&events);
    assert_eq!(summary.passes, 1);
    assert_eq!(summary.retried_count, 0);
    assert_eq!(summary.failed, 1);
    assert_eq!(generator.attempts_for(0), 1);
    assert_eq!(progress_events(&events).len(), 3);
}

#[tokio::test]
async fn test_runBatch_withSlowGenerator_shouldNeverExceedConcurrencyLimit() {
    let generator = Arc::new(ScriptedGenerator::new().with_delay(Duration::from_millis(30)));

    let (events, _) = run_batch(
        work_items(9),
        fast_config(3),
        Arc::clone(&generator),
        Arc::new(RecordingPersist::new()),
        CancellationToken::new(),
    )
    .collect()
    .await
    .unwrap();

    assert_eq!(summary_of(&events).successful, 9);
    assert_eq!(generator.max_in_flight(), 3);
}

#[tokio::test]
async fn test_runBatch_retryPass_shouldRunAtMostTwoConcurrentCalls() {
    let generator = Arc::new(ScriptedGenerator::failing(0..6).with_delay(Duration::from_millis(20)));
    let config = fast_config(5).with_retry(true, 1);

    let (events, _) = run_batch(
        work_items(6),
        config,
        Arc::clone(&generator),
        Arc::new(RecordingPersist::new()),
        CancellationToken::new(),
    )
    .collect()
    .await
    .unwrap();

    assert_eq!(summary_of(&events).retried_count, 6);
    assert_eq!(generator.max_in_flight_on_attempt(1), 5);
    assert!(generator.max_in_flight_on_attempt(2) <= 2);
    assert!(generator.max_in_flight_on_attempt(2) >= 1);
}

#[tokio::test]
async fn test_runBatch_withRecoveringItem_shouldReplaceItsFailedRecord() {
    let generator = Arc::new(ScriptedGenerator::recovering(2, 2));
    let persister = Arc::new(RecordingPersist::new());

    let (events, _) = run_batch(
        work_items(4),
        fast_config(2),
        Arc::clone(&generator),
        Arc::clone(&persister),
        CancellationToken::new(),
    )
    .collect()
    .await
    .unwrap();

    let summary = summary_of(&events);
    assert_eq!(summary.successful, 4);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.retried_count, 1);
    assert_eq!(summary.passes, 2);
    assert_eq!(summary.outcomes.len(), 4);
    assert!(summary.outcomes[2].success);
    assert!(summary.outcomes[2].error_message.is_none());

    let last = progress_events(&events).into_iter().last().unwrap();
    assert_eq!(last.completed, 4);
    assert_eq!(last.failed, 0);
    assert_eq!(last.percentage, 100);
    assert_eq!(persister.saved_indices(), vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn test_runBatch_withPersistenceFailure_shouldMarkItemFailed() {
    let generator = Arc::new(ScriptedGenerator::new());
    let persister = Arc::new(RecordingPersist::failing([1]));
    let config = fast_config(2).with_retry(false, 0);

    let (events, _) = run_batch(
        work_items(3),
        config,
        Arc::clone(&generator),
        Arc::clone(&persister),
        CancellationToken::new(),
    )
    .collect()
    .await
    .unwrap();

    let summary = summary_of(&events);
    assert_eq!(summary.successful, 2);
    assert_eq!(summary.failed, 1);
    let failed = &summary.outcomes[1];
    assert_eq!(failed.error_kind.as_deref(), Some("persistence"));
    assert!(failed.payload.is_none());
    assert!(failed.error_message.as_deref().unwrap().contains("disk full"));
}

#[tokio::test]
async fn test_runBatch_withSlowItem_shouldTimeItOut() {
    let generator = Arc::new(ScriptedGenerator::new().with_delay(Duration::from_millis(300)));
    let config = fast_config(2)
        .with_retry(false, 0)
        .with_item_timeout(Some(Duration::from_millis(20)));

    let (events, _) = run_batch(
        work_items(2),
        config,
        Arc::clone(&generator),
        Arc::new(RecordingPersist::new()),
        CancellationToken::new(),
    )
    .collect()
    .await
    .unwrap();

    let summary = summary_of(&events);
    assert_eq!(summary.failed, 2);
    assert!(summary
        .outcomes
        .iter()
        .all(|o| o.error_kind.as_deref() == Some("timeout")));
}

#[tokio::test]
async fn test_runBatch_withEmptyOutput_shouldCountAsFailure() {
    let generator = Arc::new(ScriptedGenerator::empty_for([0]));
    let persister = Arc::new(RecordingPersist::new());
    let config = fast_config(2).with_retry(false, 0);

    let (events, _) = run_batch(
        work_items(2),
        config,
        Arc::clone(&generator),
        Arc::clone(&persister),
        CancellationToken::new(),
    )
    .collect()
    .await
    .unwrap();

    let summary = summary_of(&events);
    assert_eq!(summary.outcomes[0].error_kind.as_deref(), Some("empty_result"));
    assert!(summary.outcomes[1].success);
    assert_eq!(persister.saved_indices(), vec![1]);
}

#[tokio::test]
async fn test_runBatch_whenCancelled_shouldFinishInFlightAndSkipTheRest() {
    let generator = Arc::new(ScriptedGenerator::new().with_delay(Duration::from_millis(50)));
    let persister = Arc::new(RecordingPersist::new());

    let mut stream = run_batch(
        work_items(10),
        fast_config(2),
        Arc::clone(&generator),
        Arc::clone(&persister),
        CancellationToken::new(),
    );

    let first = stream.next_event().await.unwrap();
    assert_eq!(first.name(), "progress");
    stream.cancel();

    let (rest, summary) = stream.collect().await.unwrap();
    let summary = summary.expect("a started batch always produces a summary");

    assert!(rest.last().unwrap().is_terminal());
    assert_eq!(rest.last().unwrap().name(), "complete");
    assert!(summary.cancelled);
    assert_eq!(summary.passes, 1);

    let calls = generator.calls();
    assert!(calls < 10);
    assert_eq!(summary.successful, calls);
    let cancelled = summary
        .outcomes
        .iter()
        .filter(|o| o.error_kind.as_deref() == Some("cancelled"))
        .count();
    assert_eq!(cancelled, 10 - calls);
    assert_eq!(persister.calls(), calls);
}

#[tokio::test]
async fn test_eventStream_progress_shouldBeReadableWhileRunning() {
    let stream = run_batch(
        work_items(4),
        fast_config(4),
        Arc::new(ScriptedGenerator::new()),
        Arc::new(RecordingPersist::new()),
        CancellationToken::new(),
    );

    let before = stream.progress();
    assert_eq!(before.total, 4);
    assert!(before.settled() <= 4);

    let (_, summary) = stream.collect().await.unwrap();
    assert_eq!(summary.unwrap().successful, 4);
}

#[tokio::test]
async fn test_runBatch_withPanickingGenerator_shouldStillComplete() {
    let generator = Arc::new(ScriptedGenerator::panicking([2]));
    let persister = Arc::new(RecordingPersist::new());
    let config = fast_config(2).with_retry(true, 1);

    let (events, summary) = run_batch(
        work_items(5),
        config,
        Arc::clone(&generator),
        Arc::clone(&persister),
        CancellationToken::new(),
    )
    .collect()
    .await
    .unwrap();

    assert_eq!(progress_events(&events).len(), 7);
    let terminal = summary_of(&events);
    assert_eq!(Some(terminal), summary.as_ref());
    assert_eq!(terminal.successful, 4);
    assert_eq!(terminal.failed, 1);
    assert_eq!(terminal.passes, 2);

    let broken = &terminal.outcomes[2];
    assert_eq!(broken.error_kind.as_deref(), Some("failed"));
    assert!(broken.error_message.as_deref().unwrap().contains("client bug while generating item 2"));
    assert_eq!(generator.attempts_for(2), 2);
    assert_eq!(persister.saved_indices(), vec![0, 1, 3, 4]);
}

#[tokio::test]
async fn test_runBatch_whenCancelledDuringRetryDelay_shouldStopWithoutRetrying() {
    let generator = Arc::new(ScriptedGenerator::failing([1]));
    let config = fast_config(2)
        .with_retry(true, 3)
        .with_retry_delay(Duration::from_secs(30));

    let mut stream = run_batch(
        work_items(3),
        config,
        Arc::clone(&generator),
        Arc::new(RecordingPersist::new()),
        CancellationToken::new(),
    );

    loop {
        match stream.next_event().await {
            Some(BatchEvent::Progress(snapshot)) if snapshot.current_label.starts_with("Retrying") => break,
            Some(event) => assert!(!event.is_terminal(), "batch ended before the retry delay"),
            None => panic!("stream closed before the retry delay"),
        }
    }
    stream.cancel();

    let (rest, summary) = tokio::time::timeout(Duration::from_secs(5), stream.collect())
        .await
        .expect("cancelled batch should not wait out the retry delay")
        .unwrap();
    let summary = summary.unwrap();

    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].name(), "complete");
    assert!(summary.cancelled);
    assert_eq!(summary.passes, 1);
    assert_eq!(summary.retried_count, 0);
    assert_eq!(summary.successful, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(generator.attempts_for(1), 1);
}

#[tokio::test]
async fn test_runBatch_withoutCancellation_shouldNotReportCancelled() {
    let (_, summary) = run_batch(
        work_items(3),
        fast_config(3),
        Arc::new(ScriptedGenerator::failing([0])),
        Arc::new(RecordingPersist::new()),
        CancellationToken::new(),
    )
    .collect()
    .await
    .unwrap();

    let summary = summary.unwrap();
    assert!(!summary.cancelled);
    assert_eq!(summary.passes, 3);
}
