/*!
 * Bounded executor running one pass over a set of work items.
 *
 * At most `limit` generation calls are in flight at any time. Completions are
 * handed to the caller one by one from the task driving the pass, which makes
 * that callback the single mutation point for shared batch state.
 */

use futures::future;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use log::{debug, error};
use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::errors::GenerationError;

use super::model::{OutcomeRecord, WorkItem};
use super::traits::{Generate, Payload, Persist};

/// Counts of one executor pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Concurrency the pass actually ran with
    pub concurrency: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Items never attempted because the batch was cancelled
    pub skipped: usize,
}

/// Runs the generation call over work items with a hard concurrency cap
pub struct BoundedExecutor<'a, G, P> {
    generator: &'a G,
    persister: &'a P,
    item_timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl<'a, G, P> BoundedExecutor<'a, G, P>
where
    G: Generate,
    P: Persist<G::Output>,
{
    pub fn new(generator: &'a G, persister: &'a P, cancel: CancellationToken) -> Self {
        Self {
            generator,
            persister,
            item_timeout: None,
            cancel,
        }
    }

    /// Bound every generation call by `timeout`
    pub fn with_item_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.item_timeout = timeout;
        self
    }

    /// Attempt every item once, calling `on_complete` after each completion.
    ///
    /// Never fails as a whole: per-item errors become failed records. When the
    /// batch is cancelled no further items are started, in-flight items run to
    /// completion, and the items never started are reported as cancelled.
    pub async fn execute<F>(&self, items: &[WorkItem], limit: usize, mut on_complete: F) -> PassReport
    where
        F: FnMut(OutcomeRecord<G::Output>),
    {
        let mut report = PassReport::default();
        if items.is_empty() {
            return report;
        }

        let limit = limit.clamp(1, items.len());
        report.concurrency = limit;

        let cancel = self.cancel.clone();
        let mut attempted = HashSet::with_capacity(items.len());

        let mut completions = stream::iter(items.iter().cloned())
            .take_while(move |_| future::ready(!cancel.is_cancelled()))
            .map(|item| async move {
                let result = AssertUnwindSafe(self.process(&item))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        let message = panic_message(panic.as_ref());
                        error!("Segment {} panicked: {}", item.index + 1, message);
                        Err(GenerationError::Failed(format!("generation panicked: {}", message)))
                    });
                (item, result)
            })
            .buffer_unordered(limit);

        while let Some((item, result)) = completions.next().await {
            attempted.insert(item.index);
            report.attempted += 1;

            let outcome = match result {
                Ok(payload) => {
                    report.succeeded += 1;
                    OutcomeRecord::succeeded(&item, payload)
                }
                Err(e) => {
                    debug!("Segment {} failed: {}", item.index + 1, e);
                    report.failed += 1;
                    OutcomeRecord::failed(&item, &e)
                }
            };
            on_complete(outcome);
        }
        drop(completions);

        for item in items.iter().filter(|item| !attempted.contains(&item.index)) {
            report.skipped += 1;
            on_complete(OutcomeRecord::failed(item, &GenerationError::Cancelled));
        }

        report
    }

    /// One unit of work: generate, reject empty output, persist
    async fn process(&self, item: &WorkItem) -> Result<G::Output, GenerationError> {
        let payload = match self.item_timeout {
            Some(limit) => tokio::time::timeout(limit, self.generator.generate(item))
                .await
                .map_err(|_| GenerationError::Timeout(limit))??,
            None => self.generator.generate(item).await?,
        };

        if payload.is_empty_result() {
            return Err(GenerationError::EmptyResult);
        }

        self.persister.persist(item, &payload).await?;

        Ok(payload)
    }
}

/// Text of a panic payload
fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
