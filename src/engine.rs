//! Engine facade
//!
//! Wires the translation memory, resolver, feedback lifecycle, learners,
//! evaluation harness, self-critique and action scheduler around one data
//! directory. The CLI and the daemon only talk to this type.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::actions::{ActionExecutionRecord, ActionRun, ActionScheduler, Remediator};
use crate::config::Config;
use crate::critique::{CritiqueReport, CritiqueSummary, SelfCritique};
use crate::evaluation::{EvaluationHarness, EvaluationReport, RecipeSource, TheMealDbSource};
use crate::feedback::{
    AutoValidator, FeedbackService, FeedbackStats, FeedbackStore, SqliteFeedbackStore, ValidationSummary,
    ADMIN_APPROVER,
};
use crate::learning::{ContinuousLearner, LearningCursor, LearningCycle, RetrainSummary, Retrainer};
use crate::memory::{MemoryStats, ModelPersistence, TranslationMemory};
use crate::reports::ReportStore;
use crate::resolver::{Resolution, TranslationResolver};
use crate::types::{ApprovalState, Correction, DomainType, FeedbackRecord, Language};

/// Statistics exposed to admin callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStats {
    pub memory: MemoryStats,
    pub feedback: FeedbackStats,
    pub learning_cursor: i64,
}

/// A critique together with the actions it triggered
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CritiqueOutcome {
    pub report: CritiqueReport,
    pub actions: ActionRun,
}

pub struct AdaptiveEngine {
    config: Config,
    memory: Arc<TranslationMemory>,
    resolver: Arc<TranslationResolver>,
    feedback: FeedbackService,
    validator: Arc<AutoValidator>,
    learner: Arc<ContinuousLearner>,
    retrainer: Arc<Retrainer>,
    reports: Arc<ReportStore>,
    harness: EvaluationHarness,
    critique: SelfCritique,
    actions: ActionScheduler,
}

impl AdaptiveEngine {
    /// Open the engine over the configured data directory
    pub async fn open(config: Config) -> Result<Self> {
        let data_dir = config.storage.resolve_data_dir()?;
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

        let store = SqliteFeedbackStore::new(config.storage.feedback_db_path(&data_dir))
            .await
            .context("Failed to open feedback database")?;
        let source = TheMealDbSource::new(&config.evaluation)?;

        Ok(Self::assemble(config, &data_dir, Arc::new(store), Arc::new(source)))
    }

    /// Build the engine from explicit collaborators
    pub fn assemble(
        config: Config,
        data_dir: &Path,
        store: Arc<dyn FeedbackStore>,
        source: Arc<dyn RecipeSource>,
    ) -> Self {
        let memory = Arc::new(TranslationMemory::open(ModelPersistence::new(config.storage.models_dir(data_dir))));
        let cursor = Arc::new(LearningCursor::open(config.storage.cursor_path(data_dir)));
        let reports = Arc::new(ReportStore::new(config.storage.reports_dir(data_dir)));

        let resolver = Arc::new(TranslationResolver::new(memory.clone(), &config.engine));
        let validator = Arc::new(AutoValidator::new(store.clone()));
        let learner = Arc::new(ContinuousLearner::new(
            store.clone(),
            memory.clone(),
            cursor.clone(),
            config.engine.batch_size,
        ));
        let retrainer = Arc::new(Retrainer::new(store.clone(), memory.clone(), cursor));

        let harness = EvaluationHarness::new(resolver.clone(), source, config.evaluation.clone());
        let critique = SelfCritique::new(store.clone(), memory.clone(), reports.clone(), config.critique.clone());
        let remediator = Remediator::new(validator.clone(), retrainer.clone(), learner.clone());
        let actions = ActionScheduler::new(Arc::new(remediator), reports.clone(), config.critique.action_history_cap);

        info!("Engine opened at {}", data_dir.display());
        Self {
            config,
            memory,
            resolver,
            feedback: FeedbackService::new(store),
            validator,
            learner,
            retrainer,
            reports,
            harness,
            critique,
            actions,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn memory(&self) -> &Arc<TranslationMemory> {
        &self.memory
    }

    /// Resolve a text; `None` means the caller should fall back to an
    /// external translator
    pub async fn translate(&self, text: &str, domain: DomainType, language: Language) -> Option<Resolution> {
        self.resolver.resolve(text, domain, language).await
    }

    pub async fn submit_feedback(&self, correction: Correction) -> Result<FeedbackRecord> {
        self.feedback.submit(correction).await
    }

    pub async fn approve(&self, id: i64, approver: Option<&str>) -> Result<FeedbackRecord> {
        self.feedback.approve(id, approver.unwrap_or(ADMIN_APPROVER)).await
    }

    pub async fn reject(&self, id: i64) -> Result<FeedbackRecord> {
        self.feedback.reject(id).await
    }

    pub async fn list_feedback(&self, state: Option<ApprovalState>, limit: usize) -> Result<Vec<FeedbackRecord>> {
        self.feedback.list(state, limit).await
    }

    pub async fn validate(&self) -> Result<ValidationSummary> {
        self.validator.validate_pending().await
    }

    pub async fn process_new_approved(&self) -> Result<LearningCycle> {
        self.learner.process_new_approved().await
    }

    /// Learning cycle that skips when another mutation is in flight
    pub async fn try_process_new_approved(&self) -> Result<Option<LearningCycle>> {
        self.learner.try_process_new_approved().await
    }

    pub async fn retrain(&self) -> Result<RetrainSummary> {
        self.retrainer.retrain().await
    }

    /// Retrain that skips when another mutation is in flight
    pub async fn try_retrain(&self) -> Result<Option<RetrainSummary>> {
        self.retrainer.try_retrain().await
    }

    pub async fn get_stats(&self) -> Result<EngineStats> {
        Ok(EngineStats {
            memory: self.memory.stats().await,
            feedback: self.feedback.stats().await?,
            learning_cursor: self.learner.cursor().await,
        })
    }

    /// Run the evaluation harness and store the report
    pub async fn evaluate(&self, count: Option<usize>) -> Result<EvaluationReport> {
        let count = count.unwrap_or(self.config.evaluation.sample_count);
        let report = self.harness.run(count).await?;
        self.reports.save_evaluation(&report)?;
        Ok(report)
    }

    /// Produce a critique, then act on its challenges
    pub async fn critique(&self) -> Result<CritiqueOutcome> {
        let report = self.critique.generate().await?;
        let actions = self.actions.execute_for(&report).await?;
        Ok(CritiqueOutcome { report, actions })
    }

    pub fn get_latest_critique(&self) -> Result<Option<CritiqueReport>> {
        self.critique.latest()
    }

    pub fn critique_history(&self) -> Result<Vec<CritiqueSummary>> {
        self.critique.history()
    }

    pub fn get_action_history(&self, limit: Option<usize>) -> Result<Vec<ActionExecutionRecord>> {
        self.actions.get_action_history(limit)
    }
}
