//! Translation Memory Store
//!
//! Provides:
//! - Per (domain type, language) weighted candidate tables
//! - Probability distributions derived from weights
//! - Copy-on-write snapshots for concurrent readers
//! - A single mutation gate shared by train, batch train and retrain
//! - Durable JSON documents flushed after every mutation

pub mod persistence;
pub mod table;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::{debug, info, warn};

pub use persistence::ModelPersistence;
pub use table::{distribution, Candidate, ModelTable};

use crate::error::EngineError;
use crate::types::{normalize, DomainType, Language, TrainingSample};

/// Identifies one model
pub type ModelKey = (DomainType, Language);

/// Immutable view of every model at one point in time
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshot {
    tables: HashMap<ModelKey, Arc<ModelTable>>,
    version: u64,
}

impl MemorySnapshot {
    /// Monotonic counter bumped on every published mutation
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn table(&self, domain: DomainType, language: Language) -> Option<&ModelTable> {
        self.tables.get(&(domain, language)).map(Arc::as_ref)
    }

    /// Probability distribution for a source text; empty if unseen
    pub fn probabilities(&self, domain: DomainType, language: Language, source: &str) -> Vec<Candidate> {
        self.table(domain, language)
            .map(|t| t.probabilities(source))
            .unwrap_or_default()
    }

    /// Current weight of one candidate
    pub fn weight(&self, domain: DomainType, language: Language, source: &str, translation: &str) -> u64 {
        self.table(domain, language)
            .and_then(|t| t.weights(&normalize(source)))
            .and_then(|w| w.get(translation).copied())
            .unwrap_or(0)
    }

    pub fn stats(&self) -> MemoryStats {
        let mut models = Vec::new();
        for domain in DomainType::ALL {
            for language in Language::ALL {
                let (entries, candidates) = self
                    .table(domain, language)
                    .map(|t| (t.len(), t.candidate_count()))
                    .unwrap_or((0, 0));
                models.push(ModelStats { domain, language, entries, candidates });
            }
        }
        let total_entries = models.iter().map(|m| m.entries).sum();
        MemoryStats { models, total_entries, version: self.version }
    }

    fn with_table(&self, key: ModelKey, table: ModelTable) -> Self {
        let mut tables = self.tables.clone();
        tables.insert(key, Arc::new(table));
        Self { tables, version: self.version + 1 }
    }
}

/// Size of one model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelStats {
    pub domain: DomainType,
    pub language: Language,
    /// Distinct source keys
    pub entries: usize,
    /// Distinct (key, translation) pairs
    pub candidates: usize,
}

/// Size of every model
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemoryStats {
    pub models: Vec<ModelStats>,
    pub total_entries: usize,
    pub version: u64,
}

impl MemoryStats {
    /// Source keys learned for a domain type, summed over languages
    pub fn entries_for(&self, domain: DomainType) -> usize {
        self.models
            .iter()
            .filter(|m| m.domain == domain)
            .map(|m| m.entries)
            .sum()
    }
}

/// The translation memory shared by resolver, learner and retrain
pub struct TranslationMemory {
    current: RwLock<Arc<MemorySnapshot>>,
    gate: Mutex<()>,
    persistence: ModelPersistence,
}

impl TranslationMemory {
    /// Open the memory, loading every persisted model
    pub fn open(persistence: ModelPersistence) -> Self {
        let tables: HashMap<ModelKey, Arc<ModelTable>> = persistence
            .load_all()
            .into_iter()
            .map(|(key, table)| (key, Arc::new(table)))
            .collect();
        info!("Translation memory opened with {} models from {}", tables.len(), persistence.dir().display());

        Self {
            current: RwLock::new(Arc::new(MemorySnapshot { tables, version: 0 })),
            gate: Mutex::new(()),
            persistence,
        }
    }

    /// Consistent read-only view; never observes a half-applied mutation
    pub async fn snapshot(&self) -> Arc<MemorySnapshot> {
        self.current.read().await.clone()
    }

    pub async fn stats(&self) -> MemoryStats {
        self.snapshot().await.stats()
    }

    pub async fn probabilities(&self, domain: DomainType, language: Language, source: &str) -> Vec<Candidate> {
        self.snapshot().await.probabilities(domain, language, source)
    }

    /// Wait for the mutation gate
    pub async fn writer(&self) -> MemoryWriter<'_> {
        MemoryWriter { memory: self, _guard: self.gate.lock().await }
    }

    /// Take the mutation gate only if nobody holds it
    pub fn try_writer(&self) -> Option<MemoryWriter<'_>> {
        self.gate
            .try_lock()
            .ok()
            .map(|guard| MemoryWriter { memory: self, _guard: guard })
    }

    /// Reinforce one translation, waiting for the gate
    pub async fn train(&self, domain: DomainType, language: Language, source: &str, translation: &str) -> Result<u64> {
        if normalize(source).is_empty() || translation.trim().is_empty() {
            return Err(EngineError::InvalidCorrection("source and translation must not be blank".to_string()).into());
        }
        self.writer().await.train(domain, language, source, translation).await
    }

    async fn publish(&self, snapshot: MemorySnapshot) {
        *self.current.write().await = Arc::new(snapshot);
    }
}

/// Exclusive handle for mutating the memory
pub struct MemoryWriter<'a> {
    memory: &'a TranslationMemory,
    _guard: MutexGuard<'a, ()>,
}

impl MemoryWriter<'_> {
    /// Increment one candidate, persist its model, then publish.
    ///
    /// On a persistence failure nothing is published.
    pub async fn train(&mut self, domain: DomainType, language: Language, source: &str, translation: &str) -> Result<u64> {
        let current = self.memory.snapshot().await;
        let mut table = current.table(domain, language).cloned().unwrap_or_default();
        let weight = table.train(source, translation);

        self.memory.persistence.save(domain, language, &table)?;
        self.memory.publish(current.with_table((domain, language), table)).await;

        debug!("Trained {}/{} '{}' -> '{}' (weight {})", domain, language, normalize(source), translation.trim(), weight);
        Ok(weight)
    }

    /// Train from a validated feedback sample
    pub async fn train_sample(&mut self, sample: &TrainingSample) -> Result<u64> {
        self.train(sample.domain, sample.language, &sample.source, &sample.translation).await
    }

    /// Replace every model with freshly built tables.
    ///
    /// Every document is staged to a temp file before any live document is
    /// touched; models absent from `tables` are written empty. If a rename
    /// fails, documents already renamed are rewritten from the current
    /// snapshot and nothing is published, so disk and memory both keep the
    /// previous state.
    pub async fn replace_all(&mut self, mut tables: HashMap<ModelKey, ModelTable>) -> Result<()> {
        let current = self.memory.snapshot().await;
        let mut staged = Vec::new();
        let mut published = HashMap::new();

        for domain in DomainType::ALL {
            for language in Language::ALL {
                let table = tables.remove(&(domain, language)).unwrap_or_default();
                staged.push(self.memory.persistence.stage(domain, language, &table)?);
                if !table.is_empty() {
                    published.insert((domain, language), Arc::new(table));
                }
            }
        }

        let mut committed = Vec::with_capacity(staged.len());
        for model in staged {
            let key = model.key();
            if let Err(e) = model.commit() {
                self.restore(&current, &committed);
                return Err(e);
            }
            committed.push(key);
        }

        self.memory
            .publish(MemorySnapshot { tables: published, version: current.version + 1 })
            .await;
        Ok(())
    }

    /// Rewrite the documents of `keys` from `snapshot`
    fn restore(&self, snapshot: &MemorySnapshot, keys: &[ModelKey]) {
        for &(domain, language) in keys {
            let table = snapshot.table(domain, language).cloned().unwrap_or_default();
            match self.memory.persistence.save(domain, language, &table) {
                Ok(()) => debug!("Restored model {}_{}", domain.model_name(), language),
                Err(e) => warn!("Failed to restore model {}_{}: {:#}", domain.model_name(), language, e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_train_persists_and_reloads() {
        let dir = tempdir().unwrap();
        {
            let memory = TranslationMemory::open(ModelPersistence::new(dir.path()));
            memory.train(DomainType::Ingredient, Language::Fr, "Chicken", "poulet").await.unwrap();
            memory.train(DomainType::Ingredient, Language::Fr, "chicken", "poulet").await.unwrap();
        }

        let reopened = TranslationMemory::open(ModelPersistence::new(dir.path()));
        let snapshot = reopened.snapshot().await;
        assert_eq!(snapshot.weight(DomainType::Ingredient, Language::Fr, "chicken", "poulet"), 2);
    }

    #[tokio::test]
    async fn test_snapshot_is_isolated_from_later_writes() {
        let dir = tempdir().unwrap();
        let memory = TranslationMemory::open(ModelPersistence::new(dir.path()));
        memory.train(DomainType::Unit, Language::Es, "cup", "taza").await.unwrap();

        let before = memory.snapshot().await;
        memory.train(DomainType::Unit, Language::Es, "cup", "taza").await.unwrap();
        let after = memory.snapshot().await;

        assert_eq!(before.weight(DomainType::Unit, Language::Es, "cup", "taza"), 1);
        assert_eq!(after.weight(DomainType::Unit, Language::Es, "cup", "taza"), 2);
        assert!(after.version() > before.version());
    }

    #[tokio::test]
    async fn test_try_writer_skips_while_gate_held() {
        let dir = tempdir().unwrap();
        let memory = TranslationMemory::open(ModelPersistence::new(dir.path()));

        let held = memory.writer().await;
        assert!(memory.try_writer().is_none());
        drop(held);
        assert!(memory.try_writer().is_some());
    }

    #[tokio::test]
    async fn test_replace_all_clears_absent_models() {
        let dir = tempdir().unwrap();
        let memory = TranslationMemory::open(ModelPersistence::new(dir.path()));
        memory.train(DomainType::Ingredient, Language::Fr, "salt", "sel").await.unwrap();

        let mut fresh = ModelTable::new();
        fresh.train("rice", "arroz");
        let mut tables = HashMap::new();
        tables.insert((DomainType::Ingredient, Language::Es), fresh);
        memory.writer().await.replace_all(tables).await.unwrap();

        let stats = memory.stats().await;
        assert_eq!(stats.total_entries, 1);

        let reopened = TranslationMemory::open(ModelPersistence::new(dir.path()));
        let snapshot = reopened.snapshot().await;
        assert!(snapshot.probabilities(DomainType::Ingredient, Language::Fr, "salt").is_empty());
        assert_eq!(snapshot.weight(DomainType::Ingredient, Language::Es, "rice", "arroz"), 1);
    }

    #[tokio::test]
    async fn test_failed_replace_keeps_disk_and_memory() {
        let dir = tempdir().unwrap();
        let persistence = ModelPersistence::new(dir.path());
        let memory = TranslationMemory::open(persistence.clone());
        memory.train(DomainType::Ingredient, Language::Fr, "salt", "sel").await.unwrap();
        let before = memory.snapshot().await;

        // units_fr comes after ingredients_fr, so the rename fails part way
        std::fs::create_dir_all(persistence.path_for(DomainType::Unit, Language::Fr)).unwrap();

        let mut ingredients = ModelTable::new();
        ingredients.train("salt", "sel");
        ingredients.train("rice", "riz");
        let mut units = ModelTable::new();
        units.train("cup", "tasse");
        let mut tables = HashMap::new();
        tables.insert((DomainType::Ingredient, Language::Fr), ingredients);
        tables.insert((DomainType::Unit, Language::Fr), units);

        assert!(memory.writer().await.replace_all(tables).await.is_err());

        let after = memory.snapshot().await;
        assert_eq!(after.version(), before.version());
        assert_eq!(after.weight(DomainType::Ingredient, Language::Fr, "rice", "riz"), 0);

        let reopened = TranslationMemory::open(persistence);
        let snapshot = reopened.snapshot().await;
        assert_eq!(snapshot.weight(DomainType::Ingredient, Language::Fr, "salt", "sel"), 1);
        assert_eq!(snapshot.weight(DomainType::Ingredient, Language::Fr, "rice", "riz"), 0);
        assert!(snapshot.probabilities(DomainType::Unit, Language::Fr, "cup").is_empty());
    }

    #[tokio::test]
    async fn test_blank_training_rejected() {
        let dir = tempdir().unwrap();
        let memory = TranslationMemory::open(ModelPersistence::new(dir.path()));
        assert!(memory.train(DomainType::Ingredient, Language::Fr, "  ", "poulet").await.is_err());
    }

    #[tokio::test]
    async fn test_stats_by_domain() {
        let dir = tempdir().unwrap();
        let memory = TranslationMemory::open(ModelPersistence::new(dir.path()));
        memory.train(DomainType::Ingredient, Language::Fr, "salt", "sel").await.unwrap();
        memory.train(DomainType::Ingredient, Language::Es, "salt", "sal").await.unwrap();
        memory.train(DomainType::Unit, Language::Es, "cup", "taza").await.unwrap();

        let stats = memory.stats().await;
        assert_eq!(stats.entries_for(DomainType::Ingredient), 2);
        assert_eq!(stats.entries_for(DomainType::Unit), 1);
        assert_eq!(stats.models.len(), 10);
    }
}
