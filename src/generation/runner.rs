/*!
 * Batch entry point.
 *
 * `run_batch` validates the batch, checks the backend, runs the retry
 * coordinator on a spawned task and returns the event stream. The stream
 * always ends with exactly one terminal event: `error` when the batch could
 * not start, `complete` otherwise.
 */

use log::{error, info, warn};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::errors::BatchError;

use super::config::{GenerationConfig, ValidationReport};
use super::model::{BatchSummary, ProgressSnapshot, WorkItem};
use super::progress::ProgressTracker;
use super::retry::RetryCoordinator;
use super::traits::{Generate, Persist};
use super::transport::{BatchEvent, EventSender};

/// Live view of a running batch
pub struct EventStream<O> {
    events: UnboundedReceiver<BatchEvent<O>>,
    handle: JoinHandle<Option<BatchSummary<O>>>,
    progress: Arc<ProgressTracker>,
    cancel: CancellationToken,
}

impl<O> EventStream<O> {
    /// Next event, `None` once the batch task has finished
    pub async fn next_event(&mut self) -> Option<BatchEvent<O>> {
        self.events.recv().await
    }

    /// Current progress, readable at any time
    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    /// Stop submitting new items; in-flight items still finish
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Split into the raw receiver and the task handle
    pub fn into_parts(self) -> (UnboundedReceiver<BatchEvent<O>>, JoinHandle<Option<BatchSummary<O>>>) {
        (self.events, self.handle)
    }

    /// Drain every event and wait for the batch task
    pub async fn collect(mut self) -> Result<(Vec<BatchEvent<O>>, Option<BatchSummary<O>>), JoinError> {
        let mut events = Vec::new();
        while let Some(event) = self.events.recv().await {
            events.push(event);
        }
        let summary = self.handle.await?;
        Ok((events, summary))
    }
}

/// Validate a batch and check the backend before anything is generated
pub async fn preflight<G: Generate>(
    items: &[WorkItem],
    config: &GenerationConfig,
    generator: &G,
) -> Result<ValidationReport, BatchError> {
    let report = config.validate(items);
    if !report.is_valid() {
        return Err(BatchError::InvalidConfig(report.errors));
    }

    generator
        .check_ready()
        .await
        .map_err(|e| BatchError::Unreachable(e.to_string()))?;

    Ok(report)
}

/// Start a batch on the current tokio runtime
pub fn run_batch<G, P>(
    items: Vec<WorkItem>,
    config: GenerationConfig,
    generator: Arc<G>,
    persister: Arc<P>,
    cancel: CancellationToken,
) -> EventStream<G::Output>
where
    G: Generate + 'static,
    P: Persist<G::Output> + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let progress = Arc::new(ProgressTracker::new(items.len()));

    let tracker = Arc::clone(&progress);
    let task_cancel = cancel.clone();
    let handle = tokio::spawn(async move {
        let events = EventSender::new(tx);

        let report = match preflight(&items, &config, generator.as_ref()).await {
            Ok(report) => report,
            Err(e) => {
                error!("Batch not started: {}", e);
                events.error(&e);
                return None;
            }
        };
        for warning in &report.warnings {
            warn!("{}", warning);
        }

        info!(
            "Starting batch of {} segment(s), concurrency {}, retries {}",
            items.len(),
            config.concurrency_limit,
            if config.retries_enabled() {
                format!("up to {}", config.max_retries)
            } else {
                "disabled".to_string()
            }
        );

        let mut coordinator = RetryCoordinator::new(config, generator, persister, task_cancel);
        let summary = coordinator.run(&items, &tracker, &events).await;
        events.complete(summary.clone());

        Some(summary)
    });

    EventStream {
        events: rx,
        handle,
        progress,
        cancel,
    }
}
