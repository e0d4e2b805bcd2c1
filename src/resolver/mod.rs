//! Translation Resolver
//!
//! Runs the resolution strategies in priority order (exact, fuzzy, n-gram)
//! against one consistent memory snapshot. `None` means the text is unknown
//! and the caller should fall back to an external translator.

pub mod exact;
pub mod fuzzy;
pub mod ngram;
pub mod similarity;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

pub use exact::ExactStrategy;
pub use fuzzy::FuzzyStrategy;
pub use ngram::NgramStrategy;

use crate::config::EngineConfig;
use crate::memory::{MemorySnapshot, ModelTable, TranslationMemory};
use crate::types::{normalize, DomainType, Language};

/// Which strategy produced a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Exact,
    Fuzzy,
    Ngram,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Exact => write!(f, "exact"),
            Strategy::Fuzzy => write!(f, "fuzzy"),
            Strategy::Ngram => write!(f, "ngram"),
        }
    }
}

/// A resolved translation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub translation: String,
    pub confidence: f64,
    pub strategy: Strategy,
    /// Source key the translation came from, when a single key decided it
    pub matched_key: Option<String>,
}

/// One way of picking a candidate from a model
pub trait ResolutionStrategy: Send + Sync {
    fn kind(&self) -> Strategy;

    /// Resolve an already-normalized key against one model
    fn resolve(&self, table: &ModelTable, key: &str) -> Option<Resolution>;
}

/// Orchestrates the strategies over the shared memory
pub struct TranslationResolver {
    memory: Arc<TranslationMemory>,
    strategies: Vec<Box<dyn ResolutionStrategy>>,
}

impl TranslationResolver {
    /// Resolver with the standard exact -> fuzzy -> n-gram chain
    pub fn new(memory: Arc<TranslationMemory>, config: &EngineConfig) -> Self {
        Self::with_strategies(
            memory,
            vec![
                Box::new(ExactStrategy),
                Box::new(FuzzyStrategy::new(config.fuzzy_threshold)),
                Box::new(NgramStrategy::new(config.ngram_threshold)),
            ],
        )
    }

    pub fn with_strategies(memory: Arc<TranslationMemory>, strategies: Vec<Box<dyn ResolutionStrategy>>) -> Self {
        Self { memory, strategies }
    }

    pub fn memory(&self) -> &Arc<TranslationMemory> {
        &self.memory
    }

    /// Resolve against the current snapshot
    pub async fn resolve(&self, text: &str, domain: DomainType, language: Language) -> Option<Resolution> {
        let snapshot = self.memory.snapshot().await;
        self.resolve_in(&snapshot, text, domain, language)
    }

    /// Translation text only
    pub async fn translate(&self, text: &str, domain: DomainType, language: Language) -> Option<String> {
        self.resolve(text, domain, language).await.map(|r| r.translation)
    }

    /// Resolve against a caller-held snapshot, e.g. for a whole evaluation run
    pub fn resolve_in(&self, snapshot: &MemorySnapshot, text: &str, domain: DomainType, language: Language) -> Option<Resolution> {
        let key = normalize(text);
        if key.is_empty() {
            return None;
        }
        let table = snapshot.table(domain, language)?;

        for strategy in &self.strategies {
            if let Some(resolution) = strategy.resolve(table, &key) {
                debug!("Resolved '{}' ({}/{}) via {}: '{}' ({:.3})",
                    key, domain, language, strategy.kind(), resolution.translation, resolution.confidence);
                return Some(resolution);
            }
        }

        debug!("No translation for '{}' ({}/{})", key, domain, language);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ModelPersistence;
    use tempfile::tempdir;

    async fn resolver_with(pairs: &[(&str, &str)]) -> (tempfile::TempDir, TranslationResolver) {
        let dir = tempdir().unwrap();
        let memory = Arc::new(TranslationMemory::open(ModelPersistence::new(dir.path())));
        for (source, translation) in pairs {
            memory.train(DomainType::Ingredient, Language::Fr, source, translation).await.unwrap();
        }
        let resolver = TranslationResolver::new(memory, &EngineConfig::default());
        (dir, resolver)
    }

    #[tokio::test]
    async fn test_exact_before_fuzzy() {
        let (_dir, resolver) = resolver_with(&[("onion", "oignon"), ("onions", "oignons")]).await;
        let resolution = resolver.resolve("Onion", DomainType::Ingredient, Language::Fr).await.unwrap();
        assert_eq!(resolution.strategy, Strategy::Exact);
        assert_eq!(resolution.translation, "oignon");
    }

    #[tokio::test]
    async fn test_fuzzy_fallback() {
        let (_dir, resolver) = resolver_with(&[("potatoes", "pommes de terre")]).await;
        let resolution = resolver.resolve("potatoe", DomainType::Ingredient, Language::Fr).await.unwrap();
        assert_eq!(resolution.strategy, Strategy::Fuzzy);
        assert_eq!(resolution.translation, "pommes de terre");
    }

    #[tokio::test]
    async fn test_unknown_and_blank() {
        let (_dir, resolver) = resolver_with(&[("salt", "sel")]).await;
        assert!(resolver.resolve("saffron", DomainType::Ingredient, Language::Fr).await.is_none());
        assert!(resolver.resolve("   ", DomainType::Ingredient, Language::Fr).await.is_none());
        assert!(resolver.resolve("salt", DomainType::Ingredient, Language::Es).await.is_none());
    }
}
