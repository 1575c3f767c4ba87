/*!
 * Database entity models.
 *
 * These structures map directly to database tables.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Batch status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Batch is being processed
    Running,
    /// Every segment produced questions
    Completed,
    /// Finished with at least one failed segment
    Partial,
    /// Stopped before every segment was attempted
    Cancelled,
    /// Never started, e.g. the backend was unreachable
    Failed,
}

impl BatchStatus {
    /// Final status for the given summary counts
    pub fn from_counts(failed: usize, cancelled: bool) -> Self {
        if cancelled {
            BatchStatus::Cancelled
        } else if failed > 0 {
            BatchStatus::Partial
        } else {
            BatchStatus::Completed
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchStatus::Running => write!(f, "running"),
            BatchStatus::Completed => write!(f, "completed"),
            BatchStatus::Partial => write!(f, "partial"),
            BatchStatus::Cancelled => write!(f, "cancelled"),
            BatchStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for BatchStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "running" => Ok(BatchStatus::Running),
            "completed" => Ok(BatchStatus::Completed),
            "partial" => Ok(BatchStatus::Partial),
            "cancelled" => Ok(BatchStatus::Cancelled),
            "failed" => Ok(BatchStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid batch status: {}", s)),
        }
    }
}

/// Batch record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    /// Unique batch identifier (UUID)
    pub id: String,
    /// File the segments were read from
    pub input_path: String,
    pub provider: String,
    pub model: String,
    pub total_segments: usize,
    pub successful: usize,
    pub failed: usize,
    pub retried: usize,
    pub status: BatchStatus,
    /// Creation timestamp (ISO 8601)
    pub created_at: String,
    pub completed_at: Option<String>,
}

impl BatchRecord {
    /// New running batch with a fresh id
    pub fn new(
        input_path: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
        total_segments: usize,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            input_path: input_path.into(),
            provider: provider.into(),
            model: model.into(),
            total_segments,
            successful: 0,
            failed: 0,
            retried: 0,
            status: BatchStatus::Running,
            created_at: chrono::Utc::now().to_rfc3339(),
            completed_at: None,
        }
    }
}

/// One stored question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub id: i64,
    pub batch_id: String,
    pub segment_index: usize,
    /// Order of the question within its segment
    pub position: usize,
    pub question: String,
    pub source_content: String,
    pub created_at: String,
}
