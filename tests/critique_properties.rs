//! Critique, challenge and end-to-end engine scenarios

use std::sync::Arc;

use adaptive_translation::critique::{
    classify_trend, compare, generate_challenges, ChallengeInputs, CritiqueReport, Finding, Overall, Trend,
};
use adaptive_translation::evaluation::{RecipeSource, SampleIngredient, SampleRecipe};
use adaptive_translation::feedback::{FeedbackStore, SqliteFeedbackStore};
use adaptive_translation::types::Priority;
use adaptive_translation::{AdaptiveEngine, Config, Correction, DomainType, Language};
use async_trait::async_trait;
use tempfile::tempdir;

fn report(accuracy: f64, weaknesses: usize) -> CritiqueReport {
    let mut report = CritiqueReport::empty(Overall { accuracy, total_tests: 100, total_feedbacks: 0 });
    report.weaknesses = (0..weaknesses)
        .map(|i| Finding {
            category: "coverage".to_string(),
            description: format!("weakness {}", i),
            evidence: String::new(),
            impact: None,
        })
        .collect();
    report
}

#[test]
fn trend_classification_examples() {
    let previous = vec![report(70.0, 3)];

    assert_eq!(compare(&report(75.0, 1), &previous).trend, Trend::Improving);
    assert_eq!(compare(&report(68.0, 4), &previous).trend, Trend::Degrading);
    assert_eq!(compare(&report(71.0, 3), &previous).trend, Trend::Stable);

    assert_eq!(classify_trend(2.5, 3), Trend::Degrading);
    assert_eq!(classify_trend(2.5, 0), Trend::Stable);
}

#[test]
fn no_previous_reports_is_stable() {
    let comparison = compare(&report(10.0, 9), &[]);
    assert_eq!(comparison.previous_reports_count, 0);
    assert_eq!(comparison.trend, Trend::Stable);
    assert!(comparison.metrics.accuracy.previous.is_none());
}

#[test]
fn pending_feedback_raises_validate_challenge() {
    let inputs = ChallengeInputs { pending_feedbacks: 15, accuracy: 80.0, total_tests: 10, ..Default::default() };
    let challenges = generate_challenges(&inputs);
    let validate = challenges.iter().find(|c| c.id == "validate_pending").unwrap();
    assert_eq!(validate.priority, Priority::Moyenne);
}

/// Returns the same recipe every time
struct OneRecipe;

#[async_trait]
impl RecipeSource for OneRecipe {
    fn name(&self) -> &str {
        "one-recipe"
    }

    async fn fetch_random(&self) -> anyhow::Result<Option<SampleRecipe>> {
        Ok(Some(SampleRecipe {
            id: "1".to_string(),
            title: "Chicken".to_string(),
            ingredients: vec![SampleIngredient { name: "chicken".to_string(), amount: 1.0, unit: "cup".to_string() }],
            instructions: vec!["Boil the water.".to_string()],
        }))
    }
}

fn correction(original: &str, suggested: &str, lang: &str) -> Correction {
    Correction {
        domain_type: "ingredient".to_string(),
        original_text: original.to_string(),
        current_translation: None,
        suggested_translation: suggested.to_string(),
        target_language: lang.to_string(),
    }
}

#[tokio::test]
async fn feedback_to_critique_round_trip() {
    let dir = tempdir().unwrap();
    let mut config = Config::default();
    config.evaluation.pause_ms = 0;
    let store: Arc<dyn FeedbackStore> = Arc::new(SqliteFeedbackStore::in_memory().unwrap());
    let engine = AdaptiveEngine::assemble(config, dir.path(), store, Arc::new(OneRecipe));

    // matches the reference and gets auto-validated
    engine.submit_feedback(correction("chicken", "Poulet", "fr")).await.unwrap();
    engine.submit_feedback(correction("chicken", "pollo", "es")).await.unwrap();
    // left for manual review
    let manual = engine.submit_feedback(correction("chicken", "volaille", "fr")).await.unwrap();

    let summary = engine.validate().await.unwrap();
    assert_eq!(summary.validated, 2);
    assert_eq!(summary.left_pending, 1);

    engine.process_new_approved().await.unwrap();
    let resolution = engine.translate("Chicken", DomainType::Ingredient, Language::Fr).await.unwrap();
    assert_eq!(resolution.translation, "Poulet");

    let evaluation = engine.evaluate(Some(1)).await.unwrap();
    assert_eq!(evaluation.source, "one-recipe");
    assert_eq!(evaluation.by_domain["ingredient"].correct, 1);

    let first = engine.critique().await.unwrap();
    assert_eq!(first.report.comparison.previous_reports_count, 0);
    assert_eq!(first.report.comparison.trend, Trend::Stable);
    assert_eq!(first.actions.executed, first.report.challenges.len());
    assert!(first.actions.results.iter().all(|r| r.success));

    engine.reject(manual.id).await.unwrap();
    let second = engine.critique().await.unwrap();
    assert_eq!(second.report.comparison.previous_reports_count, 1);

    let latest = engine.get_latest_critique().unwrap().unwrap();
    assert_eq!(latest.timestamp, second.report.timestamp);
    assert_eq!(engine.critique_history().unwrap().len(), 2);

    let history = engine.get_action_history(None).unwrap();
    assert_eq!(history.len(), first.actions.executed + second.actions.executed);

    let stats = engine.get_stats().await.unwrap();
    assert_eq!(stats.feedback.counts.approved, 2);
    assert_eq!(stats.feedback.counts.rejected, 1);
}
