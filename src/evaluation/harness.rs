use anyhow::Result;
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::source::synthetic_recipes;
use super::{DomainCounts, EvaluationExample, EvaluationReport, RecipeSource, SampleRecipe, Verdict, MAX_EXAMPLES};
use crate::config::EvaluationConfig;
use crate::feedback::ReferenceDictionary;
use crate::memory::MemorySnapshot;
use crate::resolver::TranslationResolver;
use crate::types::{normalize, DomainType, Language};

/// Example text is clipped to this many characters
const EXAMPLE_CHARS: usize = 100;

/// Judged item together with what was produced and expected
struct Judgement {
    verdict: Verdict,
    translated: BTreeMap<String, String>,
    expected: BTreeMap<String, String>,
}

impl Judgement {
    fn missing() -> Self {
        Self { verdict: Verdict::Missing, translated: BTreeMap::new(), expected: BTreeMap::new() }
    }
}

pub struct EvaluationHarness {
    resolver: Arc<TranslationResolver>,
    source: Arc<dyn RecipeSource>,
    reference: &'static ReferenceDictionary,
    config: EvaluationConfig,
}

impl EvaluationHarness {
    pub fn new(resolver: Arc<TranslationResolver>, source: Arc<dyn RecipeSource>, config: EvaluationConfig) -> Self {
        Self {
            resolver,
            source,
            reference: ReferenceDictionary::builtin(),
            config,
        }
    }

    /// Collect samples, then evaluate them against one memory snapshot
    pub async fn run(&self, count: usize) -> Result<EvaluationReport> {
        let mut recipes = self.collect_samples(count).await;
        let mut source = self.source.name().to_string();

        if recipes.is_empty() && count > 0 {
            warn!("No recipes collected from {}, using synthetic recipes", source);
            recipes = synthetic_recipes(self.reference, count, &mut rand::rng());
            source = "synthetic".to_string();
        }

        let snapshot = self.resolver.memory().snapshot().await;
        let report = self.evaluate(&snapshot, &recipes, &source);
        info!("Evaluation of {} recipes: {:.1}% accuracy, {:.1}% coverage ({} items)",
            report.recipes, report.accuracy, report.coverage, report.total());
        Ok(report)
    }

    /// Fetch up to `count` distinct recipes within the retry budget.
    ///
    /// Failed fetches are skipped; the result may be short.
    pub async fn collect_samples(&self, count: usize) -> Vec<SampleRecipe> {
        let budget = count.saturating_mul(self.config.retry_factor.max(1));
        let pause = Duration::from_millis(self.config.pause_ms);
        let mut seen = HashSet::new();
        let mut recipes = Vec::with_capacity(count);
        let mut attempts = 0;

        while recipes.len() < count && attempts < budget {
            attempts += 1;
            match self.source.fetch_random().await {
                Ok(Some(recipe)) => {
                    if seen.insert(recipe.id.clone()) {
                        recipes.push(recipe);
                    } else {
                        debug!("Duplicate recipe {} skipped", recipe.id);
                    }
                }
                Ok(None) => debug!("Recipe source returned no recipe"),
                Err(e) => warn!("Failed to fetch sample recipe: {:#}", e),
            }
            if !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
        }

        if recipes.len() < count {
            warn!("Collected {}/{} recipes after {} attempts", recipes.len(), count, attempts);
        }
        recipes
    }

    /// Judge every item of `recipes`
    pub fn evaluate(&self, snapshot: &MemorySnapshot, recipes: &[SampleRecipe], source: &str) -> EvaluationReport {
        let mut by_domain: BTreeMap<String, DomainCounts> = BTreeMap::new();
        let mut examples: BTreeMap<String, Vec<EvaluationExample>> = BTreeMap::new();

        let mut record = |domain: DomainType, original: &str, judgement: Judgement| {
            by_domain.entry(domain.to_string()).or_default().record(judgement.verdict);
            if judgement.verdict == Verdict::Incorrect {
                let kept = examples.entry(domain.to_string()).or_default();
                if kept.len() < MAX_EXAMPLES {
                    kept.push(EvaluationExample {
                        original: original.chars().take(EXAMPLE_CHARS).collect(),
                        translated: judgement.translated,
                        expected: judgement.expected,
                    });
                }
            }
        };

        for recipe in recipes {
            for ingredient in &recipe.ingredients {
                record(DomainType::Ingredient, &ingredient.name,
                    self.judge_term(snapshot, DomainType::Ingredient, &ingredient.name));
            }
            for instruction in &recipe.instructions {
                record(DomainType::Instruction, instruction, self.judge_instruction(snapshot, instruction));
            }
            for ingredient in &recipe.ingredients {
                record(DomainType::Unit, &ingredient.unit,
                    self.judge_term(snapshot, DomainType::Unit, &ingredient.unit));
            }
        }

        let mut totals = DomainCounts::default();
        for counts in by_domain.values() {
            totals.merge(counts);
        }

        EvaluationReport {
            timestamp: Utc::now(),
            source: source.to_string(),
            recipes: recipes.len(),
            accuracy: totals.accuracy(),
            coverage: totals.coverage(),
            by_domain,
            totals,
            examples,
        }
    }

    /// Resolve in both languages; `None` if either is unknown
    fn resolve_both(&self, snapshot: &MemorySnapshot, text: &str, domain: DomainType) -> Option<BTreeMap<String, String>> {
        Language::ALL
            .iter()
            .map(|&language| {
                self.resolver
                    .resolve_in(snapshot, text, domain, language)
                    .map(|r| (language.to_string(), r.translation))
            })
            .collect()
    }

    /// Ingredients and units: both languages must equal the reference
    fn judge_term(&self, snapshot: &MemorySnapshot, domain: DomainType, text: &str) -> Judgement {
        let Some(reference) = self.reference.lookup(domain, text) else {
            return Judgement::missing();
        };
        let Some(translated) = self.resolve_both(snapshot, text, domain) else {
            return Judgement::missing();
        };

        let expected: BTreeMap<String, String> = Language::ALL
            .iter()
            .map(|&l| (l.to_string(), reference.get(l).to_string()))
            .collect();
        let correct = expected
            .iter()
            .all(|(lang, want)| translated.get(lang).map(|got| normalize(got) == normalize(want)).unwrap_or(false));

        Judgement {
            verdict: if correct { Verdict::Correct } else { Verdict::Incorrect },
            translated,
            expected,
        }
    }

    /// Instructions: each language must contain a translated keyword
    fn judge_instruction(&self, snapshot: &MemorySnapshot, text: &str) -> Judgement {
        let keywords = self.reference.keywords_in(text);
        if keywords.is_empty() {
            return Judgement::missing();
        }
        let Some(translated) = self.resolve_both(snapshot, text, DomainType::Instruction) else {
            return Judgement::missing();
        };

        let mut expected = BTreeMap::new();
        let mut correct = true;
        for language in Language::ALL {
            let wanted: Vec<&str> = keywords.iter().map(|(_, entry)| entry.get(language)).collect();
            let got = translated.get(language.code()).map(|t| t.to_lowercase()).unwrap_or_default();
            correct &= wanted.iter().any(|w| got.contains(&w.to_lowercase()));
            expected.insert(language.to_string(), wanted.join(" | "));
        }

        Judgement {
            verdict: if correct { Verdict::Correct } else { Verdict::Incorrect },
            translated,
            expected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::evaluation::SampleIngredient;
    use crate::memory::{ModelPersistence, TranslationMemory};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    /// Cycles through canned responses
    struct ScriptedSource {
        calls: AtomicUsize,
        script: Vec<Option<&'static str>>,
    }

    #[async_trait]
    impl RecipeSource for ScriptedSource {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn fetch_random(&self) -> Result<Option<SampleRecipe>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script[n % self.script.len()] {
                Some(id) => Ok(Some(recipe(id, &["chicken"], &[]))),
                None => Err(anyhow!("connection reset")),
            }
        }
    }

    fn recipe(id: &str, ingredients: &[&str], instructions: &[&str]) -> SampleRecipe {
        SampleRecipe {
            id: id.to_string(),
            title: format!("Recipe {}", id),
            ingredients: ingredients
                .iter()
                .map(|name| SampleIngredient { name: name.to_string(), amount: 1.0, unit: "cup".to_string() })
                .collect(),
            instructions: instructions.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn config() -> EvaluationConfig {
        EvaluationConfig { pause_ms: 0, ..Default::default() }
    }

    fn harness(memory: Arc<TranslationMemory>, source: Arc<dyn RecipeSource>) -> EvaluationHarness {
        let resolver = Arc::new(TranslationResolver::new(memory, &EngineConfig::default()));
        EvaluationHarness::new(resolver, source, config())
    }

    #[tokio::test]
    async fn test_collect_dedupes_and_tolerates_failures() {
        let dir = tempdir().unwrap();
        let memory = Arc::new(TranslationMemory::open(ModelPersistence::new(dir.path())));
        let source = Arc::new(ScriptedSource {
            calls: AtomicUsize::new(0),
            script: vec![Some("1"), None, Some("1"), Some("2"), Some("3")],
        });
        let harness = harness(memory, source.clone());

        let recipes = harness.collect_samples(3).await;
        let ids: Vec<&str> = recipes.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(source.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_retry_budget_bounds_attempts() {
        let dir = tempdir().unwrap();
        let memory = Arc::new(TranslationMemory::open(ModelPersistence::new(dir.path())));
        let source = Arc::new(ScriptedSource { calls: AtomicUsize::new(0), script: vec![None] });
        let harness = harness(memory, source.clone());

        assert!(harness.collect_samples(4).await.is_empty());
        assert_eq!(source.calls.load(Ordering::SeqCst), 12);
    }

    #[tokio::test]
    async fn test_falls_back_to_synthetic_recipes() {
        let dir = tempdir().unwrap();
        let memory = Arc::new(TranslationMemory::open(ModelPersistence::new(dir.path())));
        let source = Arc::new(ScriptedSource { calls: AtomicUsize::new(0), script: vec![None] });

        let report = harness(memory, source).run(2).await.unwrap();
        assert_eq!(report.source, "synthetic");
        assert_eq!(report.recipes, 2);
        // empty memory resolves nothing
        assert_eq!(report.totals.missing, report.total());
        assert_eq!(report.coverage, 0.0);
    }

    #[tokio::test]
    async fn test_judging_rules() {
        let dir = tempdir().unwrap();
        let memory = Arc::new(TranslationMemory::open(ModelPersistence::new(dir.path())));
        for (domain, lang, source, translation) in [
            (DomainType::Ingredient, Language::Fr, "chicken", "Poulet"),
            (DomainType::Ingredient, Language::Es, "chicken", "pollo"),
            (DomainType::Ingredient, Language::Fr, "rice", "riz"),
            (DomainType::Ingredient, Language::Es, "rice", "arroz blanco"),
            (DomainType::Ingredient, Language::Fr, "salt", "sel"),
            (DomainType::Unit, Language::Fr, "cup", "tasse"),
            (DomainType::Unit, Language::Es, "cup", "taza"),
            (DomainType::Instruction, Language::Fr, "stir the sauce", "remuer la sauce"),
            (DomainType::Instruction, Language::Es, "stir the sauce", "revolver la salsa"),
        ] {
            memory.train(domain, lang, source, translation).await.unwrap();
        }
        let harness = harness(memory.clone(), Arc::new(ScriptedSource { calls: AtomicUsize::new(0), script: vec![None] }));

        let recipes = vec![recipe(
            "r1",
            &["chicken", "rice", "salt", "saffron"],
            &["stir the sauce", "Preheat the oven"],
        )];
        let snapshot = memory.snapshot().await;
        let report = harness.evaluate(&snapshot, &recipes, "test");

        let ingredients = &report.by_domain["ingredient"];
        // chicken correct, rice wrong in es, salt unknown in es, saffron has no reference
        assert_eq!(*ingredients, DomainCounts { correct: 1, incorrect: 1, missing: 2 });
        assert_eq!(report.by_domain["unit"], DomainCounts { correct: 4, incorrect: 0, missing: 0 });
        assert_eq!(report.by_domain["instruction"], DomainCounts { correct: 1, incorrect: 0, missing: 1 });

        assert_eq!(report.totals.total(), 10);
        assert!((report.accuracy - 60.0).abs() < 1e-9);
        assert!((report.coverage - 70.0).abs() < 1e-9);

        let example = &report.examples["ingredient"][0];
        assert_eq!(example.original, "rice");
        assert_eq!(example.translated["es"], "arroz blanco");
        assert_eq!(example.expected["es"], "arroz");
    }
}
