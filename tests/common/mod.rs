/*!
 * Common test utilities for the qagen test suite
 */

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

use qagen::errors::{GenerationError, ProviderError};
use qagen::generation::{GenerationConfig, Generate, Persist, WorkItem};

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// `count` work items with distinct content
pub fn work_items(count: usize) -> Vec<WorkItem> {
    (0..count)
        .map(|i| WorkItem::new(i, format!("Segment text {}", i), format!("Ask about segment {}", i)))
        .collect()
}

/// Config with short retry delays so tests stay fast
pub fn fast_config(concurrency: usize) -> GenerationConfig {
    GenerationConfig::default()
        .with_concurrency(concurrency)
        .with_retry_delay(Duration::from_millis(5))
}

/// Generator with scripted per-index behavior that records how it was called
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    /// Indices that fail on every attempt
    fail_indices: HashSet<usize>,
    /// Indices that fail until this attempt number (1-based) is reached
    recover_at: HashMap<usize, usize>,
    /// Indices that return no questions
    empty_indices: HashSet<usize>,
    /// Indices whose call panics
    panic_indices: HashSet<usize>,
    delay: Duration,
    unreachable: bool,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    attempts: Mutex<HashMap<usize, usize>>,
    /// Highest concurrency seen per attempt number
    max_in_flight_by_attempt: Mutex<HashMap<usize, usize>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(indices: impl IntoIterator<Item = usize>) -> Self {
        Self {
            fail_indices: indices.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn recovering(index: usize, succeed_on_attempt: usize) -> Self {
        let mut generator = Self::default();
        generator.recover_at.insert(index, succeed_on_attempt);
        generator
    }

    pub fn empty_for(indices: impl IntoIterator<Item = usize>) -> Self {
        Self {
            empty_indices: indices.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn panicking(indices: impl IntoIterator<Item = usize>) -> Self {
        Self {
            panic_indices: indices.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn attempts_for(&self, index: usize) -> usize {
        self.attempts.lock().get(&index).copied().unwrap_or(0)
    }

    pub fn max_in_flight_on_attempt(&self, attempt: usize) -> usize {
        self.max_in_flight_by_attempt
            .lock()
            .get(&attempt)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl Generate for ScriptedGenerator {
    type Output = Vec<String>;

    async fn check_ready(&self) -> Result<(), GenerationError> {
        if self.unreachable {
            return Err(ProviderError::ConnectionError("connection refused".to_string()).into());
        }
        Ok(())
    }

    async fn generate(&self, item: &WorkItem) -> Result<Self::Output, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let attempt = {
            let mut attempts = self.attempts.lock();
            let count = attempts.entry(item.index).or_insert(0);
            *count += 1;
            *count
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        {
            let mut by_attempt = self.max_in_flight_by_attempt.lock();
            let seen = by_attempt.entry(attempt).or_insert(0);
            *seen = (*seen).max(now);
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.panic_indices.contains(&item.index) {
            panic!("client bug while generating item {}", item.index);
        }

        let still_failing = self
            .recover_at
            .get(&item.index)
            .is_some_and(|recover| attempt < *recover);
        if self.fail_indices.contains(&item.index) || still_failing {
            return Err(GenerationError::Failed(format!(
                "attempt {} failed for item {}",
                attempt, item.index
            )));
        }

        if self.empty_indices.contains(&item.index) {
            return Ok(Vec::new());
        }

        Ok(vec![format!("What is in segment {}?", item.index)])
    }
}

/// Persistence that keeps every call in memory
#[derive(Debug, Default)]
pub struct RecordingPersist {
    saved: Mutex<Vec<(usize, Vec<String>)>>,
    fail_indices: HashSet<usize>,
}

impl RecordingPersist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persistence that rejects the given indices
    pub fn failing(indices: impl IntoIterator<Item = usize>) -> Self {
        Self {
            fail_indices: indices.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.saved.lock().len()
    }

    pub fn saved_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.saved.lock().iter().map(|(index, _)| *index).collect();
        indices.sort_unstable();
        indices
    }
}

#[async_trait]
impl Persist<Vec<String>> for RecordingPersist {
    async fn persist(&self, item: &WorkItem, output: &Vec<String>) -> Result<(), GenerationError> {
        if self.fail_indices.contains(&item.index) {
            return Err(GenerationError::Persistence("disk full".to_string()));
        }
        self.saved.lock().push((item.index, output.clone()));
        Ok(())
    }
}
