//! Self-Critique Analyzer
//!
//! Provides:
//! - Aggregation of recent evaluation reports, feedback statistics and
//!   memory statistics into strengths, weaknesses and recommendations
//! - Comparison with the previous critique and trend classification
//! - Challenge generation for the action scheduler
//! - Persistence of every critique plus a rolling summary history

pub mod analyzer;
pub mod challenges;
pub mod comparison;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

pub use challenges::{generate_challenges, Challenge, ChallengeId, ChallengeInputs, ChallengeMetrics};
pub use comparison::{classify_trend, compare, Comparison, Trend};

use crate::config::CritiqueConfig;
use crate::evaluation::EvaluationExample;
use crate::feedback::{ErrorPattern, FeedbackStats, FeedbackStore, RecurringOriginal};
use crate::memory::{MemoryStats, TranslationMemory};
use crate::reports::ReportStore;
use crate::types::Priority;

/// Headline numbers of a critique
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Overall {
    /// Average accuracy over the evaluation window, as a percentage
    pub accuracy: f64,
    pub total_tests: u64,
    pub total_feedbacks: u64,
}

/// A strength or weakness
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub category: String,
    pub description: String,
    pub evidence: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: Priority,
    pub action: String,
    pub reason: String,
    pub steps: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorTally {
    pub count: u64,
    pub examples: Vec<EvaluationExample>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyPoint {
    pub timestamp: DateTime<Utc>,
    pub accuracy: f64,
}

/// Aggregate of the evaluation window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationAnalysis {
    pub reports_considered: usize,
    pub total_tests: u64,
    pub total_correct: u64,
    pub total_incorrect: u64,
    pub total_missing: u64,
    pub average_accuracy: f64,
    /// Newest first
    pub accuracy_trend: Vec<AccuracyPoint>,
    /// Incorrect items per domain type
    pub errors_by_type: BTreeMap<String, ErrorTally>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackAnalysis {
    pub stats: FeedbackStats,
    pub common_errors: Vec<RecurringOriginal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovementSuggestion {
    pub domain_type: String,
    pub priority: Priority,
    pub suggestion: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationPatterns {
    pub common_mistakes: Vec<ErrorPattern>,
    /// Keyed by language code
    pub language_errors: BTreeMap<String, Vec<ErrorPattern>>,
    pub suggestions: Vec<ImprovementSuggestion>,
}

/// Everything a critique was derived from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CritiqueDetails {
    pub evaluation: EvaluationAnalysis,
    pub feedback: FeedbackAnalysis,
    pub memory: MemoryStats,
    pub patterns: TranslationPatterns,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CritiqueReport {
    pub timestamp: DateTime<Utc>,
    pub overall: Overall,
    pub strengths: Vec<Finding>,
    pub weaknesses: Vec<Finding>,
    pub recommendations: Vec<Recommendation>,
    #[serde(default)]
    pub comparison: Comparison,
    #[serde(default)]
    pub challenges: Vec<Challenge>,
    #[serde(default)]
    pub details: CritiqueDetails,
}

impl CritiqueReport {
    pub fn empty(overall: Overall) -> Self {
        Self {
            timestamp: Utc::now(),
            overall,
            strengths: Vec::new(),
            weaknesses: Vec::new(),
            recommendations: Vec::new(),
            comparison: Comparison::default(),
            challenges: Vec::new(),
            details: CritiqueDetails::default(),
        }
    }

    pub fn summary(&self) -> CritiqueSummary {
        CritiqueSummary {
            timestamp: self.timestamp,
            accuracy: self.overall.accuracy,
            total_tests: self.overall.total_tests,
            total_feedbacks: self.overall.total_feedbacks,
            strengths_count: self.strengths.len(),
            weaknesses_count: self.weaknesses.len(),
            recommendations_count: self.recommendations.len(),
            challenges_count: self.challenges.len(),
            trend: self.comparison.trend,
            accuracy_change: self.comparison.metrics.accuracy.change,
        }
    }
}

/// One line of the summary history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CritiqueSummary {
    pub timestamp: DateTime<Utc>,
    pub accuracy: f64,
    pub total_tests: u64,
    pub total_feedbacks: u64,
    pub strengths_count: usize,
    pub weaknesses_count: usize,
    pub recommendations_count: usize,
    pub challenges_count: usize,
    pub trend: Trend,
    pub accuracy_change: f64,
}

/// Produces and stores critiques
pub struct SelfCritique {
    store: Arc<dyn FeedbackStore>,
    memory: Arc<TranslationMemory>,
    reports: Arc<ReportStore>,
    config: CritiqueConfig,
}

impl SelfCritique {
    pub fn new(
        store: Arc<dyn FeedbackStore>,
        memory: Arc<TranslationMemory>,
        reports: Arc<ReportStore>,
        config: CritiqueConfig,
    ) -> Self {
        Self { store, memory, reports, config }
    }

    /// Gather inputs, analyze, compare, attach challenges, then persist
    pub async fn generate(&self) -> Result<CritiqueReport> {
        let evaluations = self.reports
            .recent_evaluations(self.config.evaluation_window)
            .context("Failed to load evaluation reports")?;
        let stats = self.store.stats().await.context("Failed to load feedback statistics")?;
        let common_errors = self.store.recurring_originals(analyzer::COMMON_ERRORS_LIMIT).await?;
        let patterns = self.store.error_patterns(analyzer::ERROR_PATTERNS_LIMIT).await?;

        let details = CritiqueDetails {
            evaluation: analyzer::analyze_evaluations(&evaluations),
            feedback: FeedbackAnalysis { stats, common_errors },
            memory: self.memory.stats().await,
            patterns: analyzer::analyze_patterns(&patterns),
        };
        let mut report = analyzer::build_report(details);

        let previous = self.reports
            .previous_critiques(self.config.comparison_window)
            .context("Failed to load previous critiques")?;
        report.comparison = compare(&report, &previous);
        report.challenges = generate_challenges(&ChallengeInputs::from_report(&report));

        self.reports.save_critique(&report, self.config.summary_history_cap)?;

        info!("Self-critique: {:.1}% accuracy, {} strengths, {} weaknesses, {} challenges, trend {}",
            report.overall.accuracy, report.strengths.len(), report.weaknesses.len(),
            report.challenges.len(), report.comparison.trend);
        Ok(report)
    }

    pub fn latest(&self) -> Result<Option<CritiqueReport>> {
        self.reports.latest_critique()
    }

    pub fn history(&self) -> Result<Vec<CritiqueSummary>> {
        self.reports.summary_history()
    }
}
