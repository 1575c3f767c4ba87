/*!
 * Outcome aggregation keyed by stable item index.
 */

use std::collections::BTreeMap;

use super::model::{BatchSummary, OutcomeRecord};

/// Owns the `index -> OutcomeRecord` map for the whole life of a batch
#[derive(Debug)]
pub struct ResultAggregator<O> {
    total: usize,
    outcomes: BTreeMap<usize, OutcomeRecord<O>>,
}

impl<O> ResultAggregator<O> {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            outcomes: BTreeMap::new(),
        }
    }

    /// Upsert by index, returning the record that was replaced
    pub fn record(&mut self, outcome: OutcomeRecord<O>) -> Option<OutcomeRecord<O>> {
        self.outcomes.insert(outcome.index, outcome)
    }

    pub fn get(&self, index: usize) -> Option<&OutcomeRecord<O>> {
        self.outcomes.get(&index)
    }

    /// Number of items that have a record
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn successes(&self) -> Vec<&OutcomeRecord<O>> {
        self.outcomes.values().filter(|o| o.success).collect()
    }

    pub fn failures(&self) -> Vec<&OutcomeRecord<O>> {
        self.outcomes.values().filter(|o| !o.success).collect()
    }

    /// Indices of the items whose latest attempt failed, ascending
    pub fn failed_indices(&self) -> Vec<usize> {
        self.outcomes
            .values()
            .filter(|o| !o.success)
            .map(|o| o.index)
            .collect()
    }

    /// Build the final summary. Consumes the aggregator, so it runs once.
    pub fn summarize(self, retried_count: usize, passes: usize, cancelled: bool) -> BatchSummary<O> {
        let successful = self.outcomes.values().filter(|o| o.success).count();
        let failed = self.outcomes.len() - successful;

        BatchSummary {
            total: self.total,
            successful,
            failed,
            retried_count,
            passes,
            cancelled,
            outcomes: self.outcomes.into_values().collect(),
        }
    }
}
