/*!
 * Question storage for one generation batch.
 *
 * `QuestionStore` is the persistence callback of the pipeline: every
 * successful segment replaces the stored questions of that segment in one
 * transaction, so a retried segment never leaves duplicates behind.
 */

use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use rusqlite::{params, OptionalExtension};

use crate::errors::GenerationError;
use crate::generation::{BatchSummary, Persist, WorkItem};

use super::connection::DatabaseConnection;
use super::models::{BatchRecord, BatchStatus, QuestionRecord};

/// Stores the questions of a single batch
#[derive(Debug, Clone)]
pub struct QuestionStore {
    db: DatabaseConnection,
    batch_id: String,
}

impl QuestionStore {
    /// Register a new batch and return a store writing to it
    pub async fn begin(db: DatabaseConnection, batch: BatchRecord) -> Result<Self> {
        let batch_id = batch.id.clone();

        db.execute_async(move |conn| {
            conn.execute(
                r#"
                INSERT INTO batches (
                    id, input_path, provider, model, total_segments, status, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    batch.id,
                    batch.input_path,
                    batch.provider,
                    batch.model,
                    batch.total_segments as i64,
                    batch.status.to_string(),
                    batch.created_at,
                ],
            )?;
            Ok(())
        })
        .await?;

        debug!("Registered batch {}", batch_id);
        Ok(Self { db, batch_id })
    }

    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    /// Replace the questions stored for one segment
    pub async fn save_segment(&self, segment_index: usize, source_content: &str, questions: &[String]) -> Result<usize> {
        let batch_id = self.batch_id.clone();
        let source_content = source_content.to_string();
        let questions = questions.to_vec();

        self.db
            .transaction_async(move |tx| {
                tx.execute(
                    "DELETE FROM questions WHERE batch_id = ?1 AND segment_index = ?2",
                    params![batch_id, segment_index as i64],
                )?;

                let created_at = chrono::Utc::now().to_rfc3339();
                let mut stmt = tx.prepare(
                    r#"
                    INSERT INTO questions (batch_id, segment_index, position, question, source_content, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    "#,
                )?;
                for (position, question) in questions.iter().enumerate() {
                    stmt.execute(params![
                        batch_id,
                        segment_index as i64,
                        position as i64,
                        question,
                        source_content,
                        created_at,
                    ])?;
                }

                Ok(questions.len())
            })
            .await
    }

    /// Record the final counts and status of the batch
    pub async fn finish<O>(&self, summary: &BatchSummary<O>) -> Result<BatchStatus> {
        let batch_id = self.batch_id.clone();
        let status = BatchStatus::from_counts(summary.failed, summary.cancelled);
        let (successful, failed, retried) = (summary.successful, summary.failed, summary.retried_count);

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    UPDATE batches
                    SET successful = ?1, failed = ?2, retried = ?3, status = ?4, completed_at = ?5
                    WHERE id = ?6
                    "#,
                    params![
                        successful as i64,
                        failed as i64,
                        retried as i64,
                        status.to_string(),
                        chrono::Utc::now().to_rfc3339(),
                        batch_id,
                    ],
                )?;
                Ok(())
            })
            .await?;

        Ok(status)
    }

    /// Mark a batch that never ran
    pub async fn fail(&self) -> Result<()> {
        let batch_id = self.batch_id.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    "UPDATE batches SET status = ?1, completed_at = ?2 WHERE id = ?3",
                    params![BatchStatus::Failed.to_string(), chrono::Utc::now().to_rfc3339(), batch_id],
                )?;
                Ok(())
            })
            .await
    }

    /// Every question of the batch ordered by segment, then position
    pub async fn questions_for_batch(&self) -> Result<Vec<QuestionRecord>> {
        let batch_id = self.batch_id.clone();

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT id, batch_id, segment_index, position, question, source_content, created_at
                    FROM questions
                    WHERE batch_id = ?1
                    ORDER BY segment_index, position
                    "#,
                )?;

                let rows = stmt.query_map(params![batch_id], |row| {
                    Ok(QuestionRecord {
                        id: row.get(0)?,
                        batch_id: row.get(1)?,
                        segment_index: row.get::<_, i64>(2)? as usize,
                        position: row.get::<_, i64>(3)? as usize,
                        question: row.get(4)?,
                        source_content: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                })?;

                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            })
            .await
    }

    /// Number of stored questions in the batch
    pub async fn count_for_batch(&self) -> Result<usize> {
        let batch_id = self.batch_id.clone();

        self.db
            .execute_async(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM questions WHERE batch_id = ?1",
                    params![batch_id],
                    |row| row.get(0),
                )?;
                Ok(count as usize)
            })
            .await
    }

    /// Stored batch row
    pub async fn batch(&self) -> Result<Option<BatchRecord>> {
        let batch_id = self.batch_id.clone();

        self.db
            .execute_async(move |conn| {
                let row = conn
                    .query_row(
                        r#"
                        SELECT id, input_path, provider, model, total_segments, successful, failed,
                               retried, status, created_at, completed_at
                        FROM batches WHERE id = ?1
                        "#,
                        params![batch_id],
                        |row| {
                            Ok((
                                BatchRecord {
                                    id: row.get(0)?,
                                    input_path: row.get(1)?,
                                    provider: row.get(2)?,
                                    model: row.get(3)?,
                                    total_segments: row.get::<_, i64>(4)? as usize,
                                    successful: row.get::<_, i64>(5)? as usize,
                                    failed: row.get::<_, i64>(6)? as usize,
                                    retried: row.get::<_, i64>(7)? as usize,
                                    status: BatchStatus::Running,
                                    created_at: row.get(9)?,
                                    completed_at: row.get(10)?,
                                },
                                row.get::<_, String>(8)?,
                            ))
                        },
                    )
                    .optional()?;

                match row {
                    Some((mut record, status)) => {
                        record.status = status.parse()?;
                        Ok(Some(record))
                    }
                    None => Ok(None),
                }
            })
            .await
    }
}

#[async_trait]
impl Persist<Vec<String>> for QuestionStore {
    async fn persist(&self, item: &WorkItem, output: &Vec<String>) -> Result<(), GenerationError> {
        let saved = self
            .save_segment(item.index, &item.content, output)
            .await
            .map_err(|e| GenerationError::Persistence(e.to_string()))?;
        debug!("Stored {} question(s) for {}", saved, item.label());
        Ok(())
    }
}
