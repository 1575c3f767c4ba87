/*!
 * Progress tracking for a running batch.
 *
 * All counter updates go through one lock, so concurrent writers never
 * interleave a read-modify-write and every snapshot is a consistent read.
 * The percentage is derived from the counters on every read.
 */

use parking_lot::Mutex;

use super::model::ProgressSnapshot;

#[derive(Debug)]
struct Counters {
    total: usize,
    completed: usize,
    failed: usize,
    current_label: String,
}

impl Counters {
    fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot::new(self.total, self.completed, self.failed, self.current_label.clone())
    }
}

/// Shared progress counters of one batch
#[derive(Debug)]
pub struct ProgressTracker {
    counters: Mutex<Counters>,
}

impl ProgressTracker {
    /// Create a tracker for a batch of `total` items
    pub fn new(total: usize) -> Self {
        Self {
            counters: Mutex::new(Counters {
                total,
                completed: 0,
                failed: 0,
                current_label: "Waiting to start".to_string(),
            }),
        }
    }

    /// Apply the outcome of one item and return the resulting snapshot.
    ///
    /// `previous` is the success flag of the record this outcome replaced,
    /// if any, so a retried item moves between counters instead of being
    /// counted twice.
    pub fn record(&self, success: bool, previous: Option<bool>, label: impl Into<String>) -> ProgressSnapshot {
        let mut counters = self.counters.lock();

        match previous {
            Some(true) => {
                debug_assert!(counters.completed > 0, "replaced a success that was never counted");
                counters.completed = counters.completed.saturating_sub(1);
            }
            Some(false) => {
                debug_assert!(counters.failed > 0, "replaced a failure that was never counted");
                counters.failed = counters.failed.saturating_sub(1);
            }
            None => {}
        }

        if success {
            counters.completed += 1;
        } else {
            counters.failed += 1;
        }
        counters.current_label = label.into();

        counters.snapshot()
    }

    /// Overwrite the counters at a pass boundary. `total` never changes.
    pub fn reset(&self, completed: usize, failed: usize, label: impl Into<String>) -> ProgressSnapshot {
        let mut counters = self.counters.lock();
        counters.completed = completed;
        counters.failed = failed;
        counters.current_label = label.into();
        counters.snapshot()
    }

    /// Consistent point-in-time read
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.counters.lock().snapshot()
    }
}
