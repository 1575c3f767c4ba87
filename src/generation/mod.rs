/*!
 * Bounded-concurrency generation pipeline.
 *
 * A batch of work items goes through one or more passes. Each pass runs at
 * most K generation calls at once; failed items are retried in later passes
 * at reduced concurrency. Progress is pushed as events while the batch runs
 * and a single summary is produced at the end.
 *
 * - `config`: batch settings and pre-flight validation
 * - `model`: work items, outcome records, progress snapshots, summaries
 * - `traits`: the `Generate` and `Persist` seams
 * - `executor`: one bounded pass over a set of items
 * - `progress`: shared progress counters
 * - `aggregator`: per-item outcome map
 * - `retry`: pass state machine
 * - `transport`: event types and the text event stream writer
 * - `runner`: batch entry point
 * - `questions`: question generation on top of a provider
 */

// Re-export main types for easier usage
pub use self::aggregator::ResultAggregator;
pub use self::config::{GenerationConfig, ValidationReport};
pub use self::executor::{BoundedExecutor, PassReport};
pub use self::model::{BatchSummary, OutcomeRecord, ProgressSnapshot, WorkItem};
pub use self::progress::ProgressTracker;
pub use self::questions::{parse_questions, QuestionGenerator};
pub use self::retry::{BatchState, RetryCoordinator};
pub use self::runner::{preflight, run_batch, EventStream};
pub use self::traits::{DiscardOutput, Generate, Payload, Persist};
pub use self::transport::{
    write_event_stream, BatchEvent, ErrorPayload, EventSender, EventWriter, TransportReport,
};

// Submodules
pub mod aggregator;
pub mod config;
pub mod executor;
pub mod model;
pub mod progress;
pub mod questions;
pub mod retry;
pub mod runner;
pub mod traits;
pub mod transport;
