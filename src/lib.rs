/*!
 * # qagen - question generation with bounded concurrency
 *
 * A Rust library that turns text segments into study questions using an LLM,
 * running many generation calls at once without exceeding a configured limit.
 *
 * ## Features
 *
 * - Bounded-concurrency batch execution with retry passes
 * - Live progress events and a final summary over a text event stream
 * - Cancellation that lets in-flight calls finish
 * - Generation through various AI providers:
 *   - OpenAI API and OpenAI-compatible local servers (Ollama, LM Studio)
 *   - Anthropic API
 * - SQLite persistence of generated questions
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `generation`: The batch pipeline:
 *   - `generation::executor`: Bounded executor for one pass
 *   - `generation::retry`: Retry coordinator
 *   - `generation::transport`: Progress events and their wire format
 *   - `generation::questions`: Question generation on top of a provider
 * - `segments`: Input loading and splitting
 * - `providers`: Client implementations for various LLM providers
 * - `database`: SQLite storage of generated questions
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod database;
pub mod errors;
pub mod generation;
pub mod providers;
pub mod segments;

// Re-export main types for easier usage
pub use app_config::Config;
pub use errors::{AppError, BatchError, GenerationError, ProviderError};
pub use generation::{
    run_batch, BatchEvent, BatchSummary, EventStream, GenerationConfig, Generate, Persist,
    ProgressSnapshot, QuestionGenerator, WorkItem,
};
