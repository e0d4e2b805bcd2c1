//! Full retrain: rebuild every model from all approved feedback

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use super::LearningCursor;
use crate::feedback::FeedbackStore;
use crate::memory::{MemoryWriter, ModelKey, ModelTable, TranslationMemory};
use crate::types::TrainingSample;

/// Outcome of a full retrain
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetrainSummary {
    pub records: usize,
    pub trained: usize,
    pub skipped: usize,
    pub cursor: i64,
}

pub struct Retrainer {
    store: Arc<dyn FeedbackStore>,
    memory: Arc<TranslationMemory>,
    cursor: Arc<LearningCursor>,
}

impl Retrainer {
    pub fn new(store: Arc<dyn FeedbackStore>, memory: Arc<TranslationMemory>, cursor: Arc<LearningCursor>) -> Self {
        Self { store, memory, cursor }
    }

    /// Rebuild, waiting for any in-flight mutation to finish
    pub async fn retrain(&self) -> Result<RetrainSummary> {
        let mut writer = self.memory.writer().await;
        self.rebuild(&mut writer).await
    }

    /// Rebuild, or return `None` if another mutation holds the gate
    pub async fn try_retrain(&self) -> Result<Option<RetrainSummary>> {
        match self.memory.try_writer() {
            Some(mut writer) => self.rebuild(&mut writer).await.map(Some),
            None => {
                info!("Translation memory busy, skipping retrain");
                Ok(None)
            }
        }
    }

    async fn rebuild(&self, writer: &mut MemoryWriter<'_>) -> Result<RetrainSummary> {
        let records = self.store
            .fetch_approved_all()
            .await
            .context("Failed to fetch approved feedback")?;

        let mut tables: HashMap<ModelKey, ModelTable> = HashMap::new();
        let mut summary = RetrainSummary { records: records.len(), ..Default::default() };

        for record in &records {
            match TrainingSample::try_from(record) {
                Ok(sample) => {
                    tables
                        .entry((sample.domain, sample.language))
                        .or_default()
                        .train(&sample.source, &sample.translation);
                    summary.trained += 1;
                }
                Err(e) => {
                    warn!("Skipping feedback {} during retrain: {}", record.id, e);
                    summary.skipped += 1;
                }
            }
        }

        writer.replace_all(tables).await.context("Failed to publish retrained models")?;

        summary.cursor = records.iter().map(|r| r.id).max().unwrap_or(0);
        self.cursor.reset(summary.cursor).await?;

        info!("Retrain complete: {} records, {} trained, {} skipped, cursor {}",
            summary.records, summary.trained, summary.skipped, summary.cursor);
        Ok(summary)
    }
}
