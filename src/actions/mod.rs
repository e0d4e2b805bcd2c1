//! Auto-Action Scheduler
//!
//! Maps the challenges of a critique onto remediation pipelines, runs them
//! one challenge at a time and keeps a capped history of the outcomes. A
//! failing step ends its own pipeline only; the next challenge still runs.

pub mod remediator;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub use remediator::Remediator;

use crate::critique::{ChallengeId, CritiqueReport};
use crate::reports::ReportStore;

/// Entries returned by `get_action_history` when no limit is given
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// One remediation step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStep {
    AutoValidate,
    Retrain,
    ContinuousLearn,
}

impl ActionStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStep::AutoValidate => "auto_validate",
            ActionStep::Retrain => "retrain",
            ActionStep::ContinuousLearn => "continuous_learn",
        }
    }
}

impl std::fmt::Display for ActionStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Steps run for a challenge, in order
pub fn pipeline_for(id: ChallengeId) -> &'static [ActionStep] {
    use ActionStep::*;
    match id {
        ChallengeId::FixPersistentErrors
        | ChallengeId::ApprovePendingFeedbacks
        | ChallengeId::ValidatePending
        | ChallengeId::ImproveAccuracy
        | ChallengeId::ReduceWeaknesses => &[AutoValidate, Retrain],
        ChallengeId::RecoverPerformance
        | ChallengeId::TrendRecovery
        | ChallengeId::Reach70Accuracy => &[AutoValidate, Retrain, ContinuousLearn],
        ChallengeId::MaintainImprovement => &[AutoValidate, ContinuousLearn],
    }
}

/// The operations a pipeline is made of; each returns a short outcome line
#[async_trait]
pub trait RemediationSteps: Send + Sync {
    async fn auto_validate(&self) -> Result<String>;
    async fn retrain(&self) -> Result<String>;
    async fn continuous_learn(&self) -> Result<String>;
}

/// Outcome of one challenge's pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionExecutionRecord {
    pub timestamp: DateTime<Utc>,
    pub challenge_id: String,
    /// Steps that were started, in order
    pub actions: Vec<String>,
    pub success: bool,
    pub message: String,
}

/// Result of executing the actions of one critique
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionRun {
    pub executed: usize,
    pub results: Vec<ActionExecutionRecord>,
}

pub struct ActionScheduler {
    steps: Arc<dyn RemediationSteps>,
    reports: Arc<ReportStore>,
    history_cap: usize,
    history_lock: Mutex<()>,
}

impl ActionScheduler {
    pub fn new(steps: Arc<dyn RemediationSteps>, reports: Arc<ReportStore>, history_cap: usize) -> Self {
        Self { steps, reports, history_cap, history_lock: Mutex::new(()) }
    }

    /// Run the pipeline of every challenge in the report and record the outcomes
    pub async fn execute_for(&self, report: &CritiqueReport) -> Result<ActionRun> {
        if report.challenges.is_empty() {
            info!("No challenges to act on");
            return Ok(ActionRun::default());
        }

        let mut results = Vec::with_capacity(report.challenges.len());
        for challenge in &report.challenges {
            let record = match challenge.id.parse::<ChallengeId>() {
                Ok(id) => self.run_pipeline(id).await,
                Err(message) => {
                    warn!("{}", message);
                    ActionExecutionRecord {
                        timestamp: Utc::now(),
                        challenge_id: challenge.id.clone(),
                        actions: Vec::new(),
                        success: false,
                        message,
                    }
                }
            };
            results.push(record);
        }

        self.append_history(&results).await?;

        let succeeded = results.iter().filter(|r| r.success).count();
        info!("Executed actions for {} challenges ({} succeeded)", results.len(), succeeded);
        Ok(ActionRun { executed: results.len(), results })
    }

    async fn run_pipeline(&self, id: ChallengeId) -> ActionExecutionRecord {
        let mut actions = Vec::new();
        let mut outcomes = Vec::new();

        for step in pipeline_for(id) {
            actions.push(step.to_string());
            let outcome = match step {
                ActionStep::AutoValidate => self.steps.auto_validate().await,
                ActionStep::Retrain => self.steps.retrain().await,
                ActionStep::ContinuousLearn => self.steps.continuous_learn().await,
            };
            match outcome {
                Ok(message) => outcomes.push(message),
                Err(e) => {
                    warn!("Action {} for challenge {} failed: {:#}", step, id, e);
                    return ActionExecutionRecord {
                        timestamp: Utc::now(),
                        challenge_id: id.to_string(),
                        actions,
                        success: false,
                        message: format!("{} failed: {:#}", step, e),
                    };
                }
            }
        }

        ActionExecutionRecord {
            timestamp: Utc::now(),
            challenge_id: id.to_string(),
            actions,
            success: true,
            message: outcomes.join("; "),
        }
    }

    async fn append_history(&self, records: &[ActionExecutionRecord]) -> Result<()> {
        let _guard = self.history_lock.lock().await;
        let mut history = self.reports.load_action_history()?;
        history.extend_from_slice(records);
        if history.len() > self.history_cap {
            let excess = history.len() - self.history_cap;
            history.drain(..excess);
        }
        self.reports.save_action_history(&history)
    }

    /// The most recent `limit` records, oldest first
    pub fn get_action_history(&self, limit: Option<usize>) -> Result<Vec<ActionExecutionRecord>> {
        let mut history = self.reports.load_action_history()?;
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        if history.len() > limit {
            history.drain(..history.len() - limit);
        }
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::critique::{Challenge, ChallengeMetrics, Overall};
    use crate::types::Priority;
    use mockall::mock;
    use tempfile::tempdir;

    mock! {
        pub Steps {}

        #[async_trait::async_trait]
        impl RemediationSteps for Steps {
            async fn auto_validate(&self) -> Result<String>;
            async fn retrain(&self) -> Result<String>;
            async fn continuous_learn(&self) -> Result<String>;
        }
    }

    fn challenge(id: &str) -> Challenge {
        Challenge {
            id: id.to_string(),
            title: id.to_string(),
            description: String::new(),
            priority: Priority::Moyenne,
            target: ChallengeMetrics::default(),
            current: ChallengeMetrics::default(),
            actions: Vec::new(),
            details: Vec::new(),
        }
    }

    fn report(ids: &[&str]) -> CritiqueReport {
        let mut report = CritiqueReport::empty(Overall::default());
        report.challenges = ids.iter().map(|id| challenge(id)).collect();
        report
    }

    #[test]
    fn test_pipelines() {
        assert_eq!(pipeline_for(ChallengeId::ValidatePending), &[ActionStep::AutoValidate, ActionStep::Retrain]);
        assert_eq!(
            pipeline_for(ChallengeId::TrendRecovery),
            &[ActionStep::AutoValidate, ActionStep::Retrain, ActionStep::ContinuousLearn]
        );
        assert_eq!(
            pipeline_for(ChallengeId::MaintainImprovement),
            &[ActionStep::AutoValidate, ActionStep::ContinuousLearn]
        );
    }

    #[tokio::test]
    async fn test_failure_does_not_block_siblings() {
        let dir = tempdir().unwrap();
        let mut steps = MockSteps::new();
        steps.expect_auto_validate().times(3).returning(|| Ok("validated".to_string()));
        let mut retrains = 0;
        steps.expect_retrain().times(2).returning(move || {
            retrains += 1;
            if retrains == 1 {
                Err(anyhow::anyhow!("disk full"))
            } else {
                Ok("retrained".to_string())
            }
        });
        steps.expect_continuous_learn().times(2).returning(|| Ok("learned".to_string()));

        let scheduler = ActionScheduler::new(Arc::new(steps), Arc::new(ReportStore::new(dir.path())), 100);
        let run = scheduler
            .execute_for(&report(&["validate_pending", "reach_70_accuracy", "maintain_improvement", "bogus"]))
            .await
            .unwrap();

        assert_eq!(run.executed, 4);
        assert!(!run.results[0].success);
        assert!(run.results[0].message.contains("disk full"));
        assert!(run.results[1].success);
        assert_eq!(run.results[1].actions, vec!["auto_validate", "retrain", "continuous_learn"]);
        assert!(run.results[2].success);
        assert!(!run.results[3].success);
        assert_eq!(run.results[3].message, "Unrecognized challenge type: bogus");

        let history = scheduler.get_action_history(None).unwrap();
        assert_eq!(history, run.results);
    }

    #[tokio::test]
    async fn test_history_is_capped() {
        let dir = tempdir().unwrap();
        let mut steps = MockSteps::new();
        steps.expect_auto_validate().returning(|| Ok("ok".to_string()));
        steps.expect_continuous_learn().returning(|| Ok("ok".to_string()));

        let scheduler = ActionScheduler::new(Arc::new(steps), Arc::new(ReportStore::new(dir.path())), 5);
        for _ in 0..4 {
            scheduler.execute_for(&report(&["maintain_improvement", "maintain_improvement"])).await.unwrap();
        }

        assert_eq!(scheduler.get_action_history(Some(50)).unwrap().len(), 5);
        assert_eq!(scheduler.get_action_history(Some(2)).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_no_challenges() {
        let dir = tempdir().unwrap();
        let scheduler = ActionScheduler::new(Arc::new(MockSteps::new()), Arc::new(ReportStore::new(dir.path())), 100);
        let run = scheduler.execute_for(&report(&[])).await.unwrap();
        assert_eq!(run.executed, 0);
        assert!(scheduler.get_action_history(None).unwrap().is_empty());
    }
}
