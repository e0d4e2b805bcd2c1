//! Challenges: remediation goals derived from a critique
//!
//! Every condition is evaluated independently, so a critique may carry
//! any number of challenges, including none.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{CritiqueReport, Trend};
use crate::types::Priority;

/// Accuracy goal for the `reach_70_accuracy` challenge
pub const TARGET_ACCURACY: f64 = 70.0;
/// Weakness count above which `reduce_weaknesses` fires
pub const MAX_WEAKNESSES: usize = 5;
/// Pending feedback count above which `validate_pending` fires
pub const MAX_PENDING: u64 = 10;

/// Known challenge ids, including aliases accepted by the action scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChallengeId {
    TrendRecovery,
    RecoverPerformance,
    ImproveAccuracy,
    MaintainImprovement,
    FixPersistentErrors,
    ReduceWeaknesses,
    ValidatePending,
    ApprovePendingFeedbacks,
    Reach70Accuracy,
}

impl ChallengeId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeId::TrendRecovery => "trend_recovery",
            ChallengeId::RecoverPerformance => "recover_performance",
            ChallengeId::ImproveAccuracy => "improve_accuracy",
            ChallengeId::MaintainImprovement => "maintain_improvement",
            ChallengeId::FixPersistentErrors => "fix_persistent_errors",
            ChallengeId::ReduceWeaknesses => "reduce_weaknesses",
            ChallengeId::ValidatePending => "validate_pending",
            ChallengeId::ApprovePendingFeedbacks => "approve_pending_feedbacks",
            ChallengeId::Reach70Accuracy => "reach_70_accuracy",
        }
    }
}

impl FromStr for ChallengeId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trend_recovery" => Ok(ChallengeId::TrendRecovery),
            "recover_performance" => Ok(ChallengeId::RecoverPerformance),
            "improve_accuracy" => Ok(ChallengeId::ImproveAccuracy),
            "maintain_improvement" => Ok(ChallengeId::MaintainImprovement),
            "fix_persistent_errors" => Ok(ChallengeId::FixPersistentErrors),
            "reduce_weaknesses" => Ok(ChallengeId::ReduceWeaknesses),
            "validate_pending" => Ok(ChallengeId::ValidatePending),
            "approve_pending_feedbacks" => Ok(ChallengeId::ApprovePendingFeedbacks),
            "reach_70_accuracy" => Ok(ChallengeId::Reach70Accuracy),
            other => Err(format!("Unrecognized challenge type: {}", other)),
        }
    }
}

impl std::fmt::Display for ChallengeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Metric values a challenge tracks; unset fields are not tracked
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChallengeMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weaknesses: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_errors: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_feedbacks: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    /// Kept as text so records written by other versions still load
    pub id: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub target: ChallengeMetrics,
    pub current: ChallengeMetrics,
    pub actions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl Challenge {
    pub fn kind(&self) -> Option<ChallengeId> {
        self.id.parse().ok()
    }
}

/// Inputs to challenge generation
#[derive(Debug, Clone, Default)]
pub struct ChallengeInputs {
    pub trend: Trend,
    pub accuracy: f64,
    pub total_tests: u64,
    pub weaknesses: usize,
    pub pending_feedbacks: u64,
    pub previous_accuracy: Option<f64>,
    pub previous_weaknesses: Option<f64>,
    /// Labels of mistakes that persisted since the previous critique
    pub persistent_errors: Vec<String>,
}

impl ChallengeInputs {
    pub fn from_report(report: &CritiqueReport) -> Self {
        let comparison = &report.comparison;
        Self {
            trend: comparison.trend,
            accuracy: report.overall.accuracy,
            total_tests: report.overall.total_tests,
            weaknesses: report.weaknesses.len(),
            pending_feedbacks: report.details.feedback.stats.counts.pending,
            previous_accuracy: comparison.metrics.accuracy.previous,
            previous_weaknesses: comparison.metrics.weaknesses.previous,
            persistent_errors: comparison
                .persistent_errors
                .iter()
                .map(|e| format!("{} -> {}", e.original, e.wrong.as_deref().unwrap_or("?")))
                .collect(),
        }
    }
}

fn challenge(id: ChallengeId, title: &str, description: String, priority: Priority) -> Challenge {
    Challenge {
        id: id.to_string(),
        title: title.to_string(),
        description,
        priority,
        target: ChallengeMetrics::default(),
        current: ChallengeMetrics::default(),
        actions: Vec::new(),
        details: Vec::new(),
    }
}

fn actions(steps: &[&str]) -> Vec<String> {
    steps.iter().map(|s| s.to_string()).collect()
}

pub fn generate_challenges(inputs: &ChallengeInputs) -> Vec<Challenge> {
    let mut challenges = Vec::new();
    let weaknesses = inputs.weaknesses as f64;

    match inputs.trend {
        Trend::Degrading => {
            let mut c = challenge(
                ChallengeId::TrendRecovery,
                "Recover performance",
                "Performance is degrading. Goal: return to the previous level.".to_string(),
                Priority::Haute,
            );
            c.target = ChallengeMetrics {
                accuracy: inputs.previous_accuracy,
                weaknesses: inputs.previous_weaknesses,
                ..Default::default()
            };
            c.current = ChallengeMetrics { accuracy: Some(inputs.accuracy), weaknesses: Some(weaknesses), ..Default::default() };
            c.actions = actions(&["Validate pending feedback", "Retrain the model", "Fix persistent errors"]);
            challenges.push(c);
        }
        Trend::Stable => {
            let mut c = challenge(
                ChallengeId::ImproveAccuracy,
                "Improve accuracy",
                format!("Goal: raise accuracy from {:.1}% to {:.1}%", inputs.accuracy, inputs.accuracy + 5.0),
                Priority::Moyenne,
            );
            c.target = ChallengeMetrics { accuracy: Some(inputs.accuracy + 5.0), ..Default::default() };
            c.current = ChallengeMetrics { accuracy: Some(inputs.accuracy), ..Default::default() };
            c.actions = actions(&["Collect more correct feedback", "Validate pending feedback", "Retrain the model"]);
            challenges.push(c);
        }
        Trend::Improving => {
            let mut c = challenge(
                ChallengeId::MaintainImprovement,
                "Maintain the improvement",
                "Performance is improving. Goal: keep the trend.".to_string(),
                Priority::Moyenne,
            );
            c.target = ChallengeMetrics {
                accuracy: Some(inputs.accuracy + 2.0),
                weaknesses: Some(weaknesses.max(1.0) - 1.0),
                ..Default::default()
            };
            c.current = ChallengeMetrics { accuracy: Some(inputs.accuracy), weaknesses: Some(weaknesses), ..Default::default() };
            c.actions = actions(&["Keep validating feedback", "Keep translation quality", "Watch for new errors"]);
            challenges.push(c);
        }
    }

    if !inputs.persistent_errors.is_empty() {
        let count = inputs.persistent_errors.len();
        let mut c = challenge(
            ChallengeId::FixPersistentErrors,
            "Fix persistent errors",
            format!("{} error(s) persist across critiques", count),
            Priority::Haute,
        );
        c.target = ChallengeMetrics { persistent_errors: Some(0.0), ..Default::default() };
        c.current = ChallengeMetrics { persistent_errors: Some(count as f64), ..Default::default() };
        c.actions = actions(&["Identify the errors in the report", "Add the correct translations", "Retrain with the corrections"]);
        c.details = inputs.persistent_errors.iter().take(3).cloned().collect();
        challenges.push(c);
    }

    if inputs.weaknesses > MAX_WEAKNESSES {
        let target = inputs.weaknesses.saturating_sub(2) as f64;
        let mut c = challenge(
            ChallengeId::ReduceWeaknesses,
            "Reduce weaknesses",
            format!("Goal: reduce weaknesses from {} to {}", inputs.weaknesses, target),
            Priority::Moyenne,
        );
        c.target = ChallengeMetrics { weaknesses: Some(target), ..Default::default() };
        c.current = ChallengeMetrics { weaknesses: Some(weaknesses), ..Default::default() };
        c.actions = actions(&["Address high priority recommendations", "Validate pending feedback", "Retrain the model"]);
        challenges.push(c);
    }

    if inputs.pending_feedbacks > MAX_PENDING {
        let mut c = challenge(
            ChallengeId::ValidatePending,
            "Validate pending feedback",
            format!("{} feedback(s) awaiting validation", inputs.pending_feedbacks),
            Priority::Moyenne,
        );
        c.target = ChallengeMetrics { pending_feedbacks: Some(0.0), ..Default::default() };
        c.current = ChallengeMetrics { pending_feedbacks: Some(inputs.pending_feedbacks as f64), ..Default::default() };
        c.actions = actions(&["Run auto-validation", "Review important feedback manually", "Reject wrong feedback"]);
        challenges.push(c);
    }

    if inputs.accuracy < TARGET_ACCURACY && inputs.total_tests > 0 {
        let mut c = challenge(
            ChallengeId::Reach70Accuracy,
            "Reach 70% accuracy",
            format!("Current accuracy {:.1}%. Goal: {:.0}%", inputs.accuracy, TARGET_ACCURACY),
            Priority::Haute,
        );
        c.target = ChallengeMetrics { accuracy: Some(TARGET_ACCURACY), ..Default::default() };
        c.current = ChallengeMetrics { accuracy: Some(inputs.accuracy), ..Default::default() };
        c.actions = actions(&["Validate all correct feedback", "Retrain the model", "Add reference translations"]);
        challenges.push(c);
    }

    challenges
}
