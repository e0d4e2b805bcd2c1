//! Learning watermark
//!
//! Highest feedback id already folded into the translation memory by
//! incremental learning. Persisted so restarts resume where they stopped.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::memory::persistence::{read_json, write_json_atomic};

#[derive(Debug, Serialize, Deserialize)]
struct CursorDocument {
    last_processed_id: i64,
    updated_at: DateTime<Utc>,
}

/// Persisted learning cursor.
///
/// Only mutated by code holding the memory's mutation gate.
pub struct LearningCursor {
    path: PathBuf,
    value: RwLock<i64>,
}

impl LearningCursor {
    /// Load the cursor from `path`; missing or unreadable files start at 0
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let value = match read_json::<CursorDocument>(&path) {
            Ok(Some(doc)) => doc.last_processed_id.max(0),
            Ok(None) => 0,
            Err(e) => {
                warn!("Ignoring unreadable learning cursor {}: {:#}", path.display(), e);
                0
            }
        };
        Self { path, value: RwLock::new(value) }
    }

    pub async fn get(&self) -> i64 {
        *self.value.read().await
    }

    /// Move forward to `id`; never moves backwards
    pub async fn advance(&self, id: i64) -> Result<i64> {
        let mut value = self.value.write().await;
        if id <= *value {
            return Ok(*value);
        }
        self.persist(id)?;
        debug!("Learning cursor advanced {} -> {}", *value, id);
        *value = id;
        Ok(id)
    }

    /// Set the cursor unconditionally; only a full retrain does this
    pub async fn reset(&self, id: i64) -> Result<()> {
        let mut value = self.value.write().await;
        self.persist(id)?;
        *value = id;
        Ok(())
    }

    fn persist(&self, id: i64) -> Result<()> {
        write_json_atomic(
            &self.path,
            &CursorDocument { last_processed_id: id, updated_at: Utc::now() },
        )
    }
}
