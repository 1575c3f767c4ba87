/*!
 * Collaborator traits of the generation pipeline.
 *
 * The pipeline knows nothing about prompts, models or storage. It drives a
 * [`Generate`] implementation for every work item and hands each successful
 * output to a [`Persist`] implementation before counting it as a success.
 */

use async_trait::async_trait;
use serde::Serialize;

use crate::errors::GenerationError;

use super::model::WorkItem;

/// Output type produced by a generator
pub trait Payload: Clone + Serialize + Send + Sync + 'static {
    /// Whether the output carries nothing usable. Empty outputs are failures.
    fn is_empty_result(&self) -> bool {
        false
    }
}

impl<T> Payload for Vec<T>
where
    T: Clone + Serialize + Send + Sync + 'static,
{
    fn is_empty_result(&self) -> bool {
        self.is_empty()
    }
}

impl Payload for String {
    fn is_empty_result(&self) -> bool {
        self.trim().is_empty()
    }
}

/// Per-item generation call
#[async_trait]
pub trait Generate: Send + Sync {
    /// What one successful call produces
    type Output: Payload;

    /// Check that the backend can be used before the first item is attempted
    async fn check_ready(&self) -> Result<(), GenerationError> {
        Ok(())
    }

    /// Produce the output for one work item
    async fn generate(&self, item: &WorkItem) -> Result<Self::Output, GenerationError>;
}

/// Storage callback run for every successful item
#[async_trait]
pub trait Persist<O: Sync>: Send + Sync {
    /// Save the output of one item. A failure marks the item as failed.
    async fn persist(&self, item: &WorkItem, output: &O) -> Result<(), GenerationError>;
}

/// Persistence that stores nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardOutput;

#[async_trait]
impl<O: Sync> Persist<O> for DiscardOutput {
    async fn persist(&self, _item: &WorkItem, _output: &O) -> Result<(), GenerationError> {
        Ok(())
    }
}
