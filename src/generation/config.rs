/*!
 * Batch configuration and pre-flight validation.
 *
 * Validation is pure: the same configuration and items always produce the
 * same errors and warnings, and nothing is called on the generation backend.
 */

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use super::model::WorkItem;

/// Concurrency above this value triggers a warning
pub const CONCURRENCY_WARN_THRESHOLD: usize = 10;

/// Batches with more segments than this trigger a warning
pub const SEGMENT_COUNT_WARN_THRESHOLD: usize = 50;

/// Segments longer than this many characters trigger a warning
pub const SEGMENT_LENGTH_WARN_THRESHOLD: usize = 4000;

/// Concurrency used by retry passes never exceeds this
pub const RETRY_CONCURRENCY_CAP: usize = 2;

/// Settings of one generation batch, immutable while the batch runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Maximum number of concurrent generation calls in the first pass
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    /// Maximum number of retry passes after the first one
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Delay before each retry pass, in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Whether failed items are retried at all
    #[serde(default = "default_true")]
    pub enable_retry: bool,

    /// Upper bound for a single generation call in milliseconds, 0 disables it
    #[serde(default = "default_item_timeout_ms")]
    pub item_timeout_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: default_concurrency_limit(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            enable_retry: true,
            item_timeout_ms: default_item_timeout_ms(),
        }
    }
}

fn default_concurrency_limit() -> usize {
    5
}

fn default_max_retries() -> usize {
    2
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_item_timeout_ms() -> u64 {
    120_000
}

fn default_true() -> bool {
    true
}

impl GenerationConfig {
    /// Set the first-pass concurrency limit.
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, enabled: bool, max_retries: usize) -> Self {
        self.enable_retry = enabled;
        self.max_retries = max_retries;
        self
    }

    /// Set the delay between passes.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Set the per-item timeout, `None` disables it.
    pub fn with_item_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.item_timeout_ms = timeout.map(|t| (t.as_millis() as u64).max(1)).unwrap_or(0);
        self
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn item_timeout(&self) -> Option<Duration> {
        (self.item_timeout_ms > 0).then(|| Duration::from_millis(self.item_timeout_ms))
    }

    /// Concurrency of retry passes: `min(K, 2)`
    pub fn retry_concurrency(&self) -> usize {
        self.concurrency_limit.clamp(1, RETRY_CONCURRENCY_CAP)
    }

    /// Whether a batch with this configuration can ever run a retry pass
    pub fn retries_enabled(&self) -> bool {
        self.enable_retry && self.max_retries > 0
    }

    /// Validate the configuration against the items of a batch
    pub fn validate(&self, items: &[WorkItem]) -> ValidationReport {
        let mut report = ValidationReport::default();

        if self.concurrency_limit == 0 {
            report.errors.push("Concurrency limit must be at least 1".to_string());
        } else if self.concurrency_limit > CONCURRENCY_WARN_THRESHOLD {
            report.warnings.push(format!(
                "Concurrency limit {} is above {}, the provider may rate limit requests",
                self.concurrency_limit, CONCURRENCY_WARN_THRESHOLD
            ));
        }

        if items.is_empty() {
            report.errors.push("No segments to process".to_string());
            return report;
        }

        if items.len() > SEGMENT_COUNT_WARN_THRESHOLD {
            report.warnings.push(format!(
                "{} segments selected, batches above {} take a long time",
                items.len(),
                SEGMENT_COUNT_WARN_THRESHOLD
            ));
        }

        let mut seen = HashSet::with_capacity(items.len());
        let duplicates = items.iter().filter(|item| !seen.insert(item.index)).count();
        if duplicates > 0 {
            report.errors.push(format!("{} segment(s) share an index with another segment", duplicates));
        }

        let empty_content: Vec<String> = items
            .iter()
            .filter(|item| item.content.trim().is_empty())
            .map(|item| (item.index + 1).to_string())
            .collect();
        if !empty_content.is_empty() {
            report.errors.push(format!("Empty segment content: {}", empty_content.join(", ")));
        }

        let empty_prompt = items
            .iter()
            .filter(|item| item.rendered_prompt.trim().is_empty())
            .count();
        if empty_prompt > 0 {
            report.errors.push(format!("{} segment(s) have an empty prompt", empty_prompt));
        }

        let oversized = items
            .iter()
            .filter(|item| item.content.chars().count() > SEGMENT_LENGTH_WARN_THRESHOLD)
            .count();
        if oversized > 0 {
            report.warnings.push(format!(
                "{} segment(s) exceed {} characters and may be truncated by the model",
                oversized, SEGMENT_LENGTH_WARN_THRESHOLD
            ));
        }

        report
    }
}

/// Errors and warnings found before a batch starts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}
