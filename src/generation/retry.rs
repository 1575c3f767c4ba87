/*!
 * Retry coordinator: drives executor passes until nothing is left to retry.
 *
 * State machine:
 *
 * ```text
 * Idle -> Running(pass 1) -> [Retrying(pass 2..=max_retries + 1)]* -> Done
 * ```
 *
 * A retry pass re-submits only the items whose latest record is a failure,
 * after `retry_delay`, at `min(K, 2)` concurrency. The outcome map survives
 * across passes, so a retried item replaces its own record.
 */

use log::{debug, info};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::aggregator::ResultAggregator;
use super::config::GenerationConfig;
use super::executor::BoundedExecutor;
use super::model::{BatchSummary, WorkItem};
use super::progress::ProgressTracker;
use super::traits::{Generate, Persist};
use super::transport::EventSender;

/// Lifecycle of one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Running { pass: usize },
    Retrying { pass: usize },
    Done,
}


/// Runs the passes of a single batch
pub struct RetryCoordinator<G, P> {
    config: GenerationConfig,
    generator: Arc<G>,
    persister: Arc<P>,
    cancel: CancellationToken,
    state: BatchState,
    history: Vec<BatchState>,
}

impl<G, P> RetryCoordinator<G, P>
where
    G: Generate,
    P: Persist<G::Output>,
{
    pub fn new(config: GenerationConfig, generator: Arc<G>, persister: Arc<P>, cancel: CancellationToken) -> Self {
        Self {
            config,
            generator,
            persister,
            cancel,
            state: BatchState::Idle,
            history: vec![BatchState::Idle],
        }
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Every state the coordinator went through, in order
    pub fn history(&self) -> &[BatchState] {
        &self.history
    }

    /// State following a finished pass
    pub fn next_state(&self, pass: usize, failures: usize) -> BatchState {
        if self.retry_due(pass, failures) && !self.cancel.is_cancelled() {
            BatchState::Retrying { pass: pass + 1 }
        } else {
            BatchState::Done
        }
    }

    /// Whether the retry policy asks for another pass, ignoring cancellation
    fn retry_due(&self, pass: usize, failures: usize) -> bool {
        let retries_done = pass.saturating_sub(1);
        failures > 0 && self.config.enable_retry && retries_done < self.config.max_retries
    }

    fn transition(&mut self, state: BatchState) {
        debug!("Batch state {:?} -> {:?}", self.state, state);
        self.state = state;
        self.history.push(state);
    }

    /// Run every pass and return the summary, computed exactly once
    pub async fn run(
        &mut self,
        items: &[WorkItem],
        tracker: &ProgressTracker,
        events: &EventSender<G::Output>,
    ) -> BatchSummary<G::Output> {
        let mut aggregator = ResultAggregator::new(items.len());
        let mut retried_count = 0;
        let mut passes = 0;
        // Set only when cancellation left work undone
        let mut cancelled = false;
        let mut pending: Vec<WorkItem> = items.to_vec();

        let generator = Arc::clone(&self.generator);
        let persister = Arc::clone(&self.persister);
        let cancel = self.cancel.clone();
        let executor = BoundedExecutor::new(generator.as_ref(), persister.as_ref(), cancel.clone())
            .with_item_timeout(self.config.item_timeout());

        self.transition(BatchState::Running { pass: 1 });

        loop {
            let (pass, limit) = match self.state {
                BatchState::Running { pass } => (pass, self.config.concurrency_limit),
                BatchState::Retrying { pass } => (pass, self.config.retry_concurrency()),
                BatchState::Idle | BatchState::Done => break,
            };

            passes += 1;
            info!(
                "Pass {}: {} segment(s), concurrency {}",
                pass,
                pending.len(),
                limit.min(pending.len())
            );

            let report = executor
                .execute(&pending, limit, |outcome| {
                    let label = if outcome.success {
                        format!("Generated questions for segment {}", outcome.index + 1)
                    } else {
                        format!("Segment {} failed", outcome.index + 1)
                    };
                    let success = outcome.success;
                    let previous = aggregator.record(outcome).map(|p| p.success);
                    events.progress(tracker.record(success, previous, label));
                })
                .await;

            debug!("Pass {} finished: {:?}", pass, report);

            let failed_indices = aggregator.failed_indices();
            if report.skipped > 0 || (self.cancel.is_cancelled() && self.retry_due(pass, failed_indices.len())) {
                cancelled = true;
            }
            let next = self.next_state(pass, failed_indices.len());
            self.transition(next);

            let BatchState::Retrying { pass: next_pass } = next else {
                break;
            };

            let label = format!(
                "Retrying {} failed item(s), pass {} of {}",
                failed_indices.len(),
                next_pass,
                self.config.max_retries + 1
            );
            info!("{}", label);
            events.progress(tracker.reset(
                aggregator.successes().len(),
                failed_indices.len(),
                label,
            ));

            let interrupted = tokio::select! {
                _ = tokio::time::sleep(self.config.retry_delay()) => false,
                _ = cancel.cancelled() => true,
            };
            if interrupted {
                cancelled = true;
                info!("Batch cancelled while waiting to retry");
                self.transition(BatchState::Done);
                break;
            }

            let failed: HashSet<usize> = failed_indices.into_iter().collect();
            pending = items
                .iter()
                .filter(|item| failed.contains(&item.index))
                .cloned()
                .collect();
            retried_count += pending.len();
        }

        let summary = aggregator.summarize(retried_count, passes, cancelled);

        info!(
            "Batch finished: {} of {} succeeded, {} failed, {} retried",
            summary.successful, summary.total, summary.failed, summary.retried_count
        );

        summary
    }
}
