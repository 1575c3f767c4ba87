/*!
 * SQLite persistence for generated questions.
 *
 * - `connection`: connection handling and async access
 * - `schema`: table definitions and versioning
 * - `models`: row types
 * - `store`: the per-batch question store used as the pipeline's persistence step
 */

pub mod connection;
pub mod models;
pub mod schema;
pub mod store;

// Re-export main types
pub use connection::DatabaseConnection;
pub use models::{BatchRecord, BatchStatus, QuestionRecord};
pub use store::QuestionStore;
