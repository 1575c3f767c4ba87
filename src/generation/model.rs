/*!
 * Data model shared by the generation pipeline.
 *
 * Work items are created once per batch and never mutated. Outcome records
 * are keyed by the item's stable index, so a retry pass replaces the record
 * of the same index instead of adding a new one.
 */

use serde::{Deserialize, Serialize};

use crate::app_config::PromptConfig;
use crate::errors::GenerationError;

use super::traits::Payload;

/// One segment of input to be turned into generated output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    /// 0-based position in the original batch, stable across retries
    pub index: usize,

    /// Raw segment text
    pub content: String,

    /// Prompt sent to the generation backend
    pub rendered_prompt: String,
}

impl WorkItem {
    /// Create a new work item
    pub fn new(index: usize, content: impl Into<String>, rendered_prompt: impl Into<String>) -> Self {
        Self {
            index,
            content: content.into(),
            rendered_prompt: rendered_prompt.into(),
        }
    }

    /// Build the work items of a batch, rendering one prompt per segment
    pub fn from_segments<S: AsRef<str>>(segments: &[S], prompt: &PromptConfig) -> Vec<Self> {
        segments
            .iter()
            .enumerate()
            .map(|(index, segment)| {
                let content = segment.as_ref();
                Self::new(index, content, prompt.render(content))
            })
            .collect()
    }

    /// Short human-readable label used in progress messages
    pub fn label(&self) -> String {
        format!("segment {}", self.index + 1)
    }
}

/// Result of the most recent attempt at one work item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeRecord<O> {
    pub index: usize,
    pub success: bool,
    pub payload: Option<O>,
    pub error_message: Option<String>,
    /// Failure kind, see [`GenerationError::kind`]
    pub error_kind: Option<String>,
    pub source_content: String,
}

impl<O: Payload> OutcomeRecord<O> {
    /// Record a successful attempt
    pub fn succeeded(item: &WorkItem, payload: O) -> Self {
        Self {
            index: item.index,
            success: true,
            payload: Some(payload),
            error_message: None,
            error_kind: None,
            source_content: item.content.clone(),
        }
    }

    /// Record a failed attempt
    pub fn failed(item: &WorkItem, error: &GenerationError) -> Self {
        Self {
            index: item.index,
            success: false,
            payload: None,
            error_message: Some(error.to_string()),
            error_kind: Some(error.kind().to_string()),
            source_content: item.content.clone(),
        }
    }
}

/// Point-in-time view of batch progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub current_label: String,
    pub percentage: u32,
}

impl ProgressSnapshot {
    /// Build a snapshot, deriving the percentage from the counters
    pub fn new(total: usize, completed: usize, failed: usize, current_label: impl Into<String>) -> Self {
        Self {
            total,
            completed,
            failed,
            current_label: current_label.into(),
            percentage: percentage(total, completed + failed),
        }
    }

    /// Number of items that have settled, successfully or not
    pub fn settled(&self) -> usize {
        self.completed + self.failed
    }
}

/// `round(100 * done / total)`, 0 for an empty batch
fn percentage(total: usize, done: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    let done = done.min(total) as u64;
    let total = total as u64;
    ((200 * done + total) / (2 * total)) as u32
}

/// Final statistics of a batch, including all retry passes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary<O> {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// Cumulative number of resubmissions across all retry passes
    pub retried_count: usize,
    /// Number of executor passes that ran
    pub passes: usize,
    /// Whether the batch was stopped early
    pub cancelled: bool,
    /// One record per work item, ordered by index
    pub outcomes: Vec<OutcomeRecord<O>>,
}

impl<O> BatchSummary<O> {
    /// Payloads of the successful items, in index order
    pub fn successful_payloads(&self) -> impl Iterator<Item = &O> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.success)
            .filter_map(|outcome| outcome.payload.as_ref())
    }

    /// Records of the items that still failed at the end of the batch
    pub fn failures(&self) -> impl Iterator<Item = &OutcomeRecord<O>> {
        self.outcomes.iter().filter(|outcome| !outcome.success)
    }
}
