//! Continuous learner
//!
//! Folds newly approved feedback into the translation memory, one bounded
//! batch per cycle, advancing the cursor only past records that were
//! trained or permanently skipped.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::LearningCursor;
use crate::error::is_malformed;
use crate::feedback::FeedbackStore;
use crate::memory::{MemoryWriter, TranslationMemory};
use crate::types::TrainingSample;

/// Outcome of one learning cycle
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LearningCycle {
    pub fetched: usize,
    pub trained: usize,
    /// Malformed records skipped for good
    pub skipped: usize,
    pub cursor_before: i64,
    pub cursor_after: i64,
}

pub struct ContinuousLearner {
    store: Arc<dyn FeedbackStore>,
    memory: Arc<TranslationMemory>,
    cursor: Arc<LearningCursor>,
    batch_size: usize,
}

impl ContinuousLearner {
    pub fn new(
        store: Arc<dyn FeedbackStore>,
        memory: Arc<TranslationMemory>,
        cursor: Arc<LearningCursor>,
        batch_size: usize,
    ) -> Self {
        Self { store, memory, cursor, batch_size: batch_size.max(1) }
    }

    pub async fn cursor(&self) -> i64 {
        self.cursor.get().await
    }

    /// Process one batch, waiting for any in-flight mutation to finish
    pub async fn process_new_approved(&self) -> Result<LearningCycle> {
        let mut writer = self.memory.writer().await;
        self.run_batch(&mut writer).await
    }

    /// Process one batch, or return `None` if another mutation holds the gate
    pub async fn try_process_new_approved(&self) -> Result<Option<LearningCycle>> {
        match self.memory.try_writer() {
            Some(mut writer) => self.run_batch(&mut writer).await.map(Some),
            None => {
                info!("Translation memory busy, skipping learning cycle");
                Ok(None)
            }
        }
    }

    async fn run_batch(&self, writer: &mut MemoryWriter<'_>) -> Result<LearningCycle> {
        let cursor_before = self.cursor.get().await;
        let records = self.store
            .fetch_approved_since(cursor_before, self.batch_size)
            .await
            .context("Failed to fetch approved feedback")?;

        let mut cycle = LearningCycle {
            fetched: records.len(),
            cursor_before,
            cursor_after: cursor_before,
            ..Default::default()
        };
        if records.is_empty() {
            debug!("No new approved feedback since {}", cursor_before);
            return Ok(cycle);
        }

        let mut last_done = cursor_before;
        for record in &records {
            let outcome = match TrainingSample::try_from(record) {
                Ok(sample) => writer.train_sample(&sample).await.map(|_| ()),
                Err(e) => Err(e.into()),
            };
            match outcome {
                Ok(()) => cycle.trained += 1,
                Err(e) if is_malformed(&e) => {
                    warn!("Skipping feedback {}: {}", record.id, e);
                    cycle.skipped += 1;
                }
                Err(e) => {
                    // keep what was already applied, retry the rest next cycle
                    self.cursor.advance(last_done).await?;
                    return Err(e.context(format!("Failed to train feedback {}", record.id)));
                }
            }
            last_done = record.id;
        }

        cycle.cursor_after = self.cursor.advance(last_done).await?;
        info!("Learning cycle: {} fetched, {} trained, {} skipped, cursor {} -> {}",
            cycle.fetched, cycle.trained, cycle.skipped, cycle.cursor_before, cycle.cursor_after);
        Ok(cycle)
    }
}
