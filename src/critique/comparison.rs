//! Critique-over-critique comparison and trend classification

use serde::{Deserialize, Serialize};

use super::CritiqueReport;
use crate::feedback::ErrorPattern;
use crate::types::Priority;

/// Accuracy swing (percentage points) that counts as a real change
pub const ACCURACY_TREND_DELTA: f64 = 2.0;
/// Weakness increase that alone marks a degradation
pub const WEAKNESS_TREND_DELTA: i64 = 2;

/// Direction of performance between two critiques
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    #[default]
    Stable,
    Degrading,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trend::Improving => write!(f, "improving"),
            Trend::Stable => write!(f, "stable"),
            Trend::Degrading => write!(f, "degrading"),
        }
    }
}

/// Classify a trend from accuracy and weakness-count deltas.
///
/// The degrading bound is inclusive: a drop of exactly the accuracy delta
/// (70 to 68) is degrading, while the improving bound stays strict. A
/// strict `< -2` would classify 70/3 to 68/4 as stable.
pub fn classify_trend(accuracy_change: f64, weaknesses_change: i64) -> Trend {
    if accuracy_change > ACCURACY_TREND_DELTA && weaknesses_change < 0 {
        Trend::Improving
    } else if accuracy_change <= -ACCURACY_TREND_DELTA || weaknesses_change > WEAKNESS_TREND_DELTA {
        Trend::Degrading
    } else {
        Trend::Stable
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricChange {
    pub current: f64,
    pub previous: Option<f64>,
    pub change: f64,
}

impl MetricChange {
    fn new(current: f64, previous: Option<f64>) -> Self {
        let change = previous.map(|p| current - p).unwrap_or(0.0);
        Self { current, previous, change }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonMetrics {
    pub accuracy: MetricChange,
    pub total_feedbacks: MetricChange,
    pub strengths: MetricChange,
    pub weaknesses: MetricChange,
}

/// One improvement or degradation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub metric: String,
    pub change: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Priority>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Comparison {
    /// Previous critiques found within the comparison window
    pub previous_reports_count: usize,
    pub trend: Trend,
    pub metrics: ComparisonMetrics,
    pub improvements: Vec<Change>,
    pub degradations: Vec<Change>,
    /// Mistakes present in both critiques with non-decreasing frequency
    pub persistent_errors: Vec<ErrorPattern>,
    pub new_errors: Vec<ErrorPattern>,
    pub fixed_errors: Vec<ErrorPattern>,
}

fn same_mistake(a: &ErrorPattern, b: &ErrorPattern) -> bool {
    a.original == b.original && a.wrong == b.wrong
}

fn mistake_labels(errors: &[ErrorPattern]) -> Vec<String> {
    errors
        .iter()
        .take(3)
        .map(|e| format!("{} -> {}", e.original, e.wrong.as_deref().unwrap_or("?")))
        .collect()
}

/// Compare `current` with the most recent of `previous` (newest first)
pub fn compare(current: &CritiqueReport, previous: &[CritiqueReport]) -> Comparison {
    let mut comparison = Comparison {
        previous_reports_count: previous.len(),
        metrics: ComparisonMetrics {
            accuracy: MetricChange::new(current.overall.accuracy, None),
            total_feedbacks: MetricChange::new(current.overall.total_feedbacks as f64, None),
            strengths: MetricChange::new(current.strengths.len() as f64, None),
            weaknesses: MetricChange::new(current.weaknesses.len() as f64, None),
        },
        ..Default::default()
    };

    let Some(last) = previous.first() else {
        return comparison;
    };

    comparison.metrics = ComparisonMetrics {
        accuracy: MetricChange::new(current.overall.accuracy, Some(last.overall.accuracy)),
        total_feedbacks: MetricChange::new(
            current.overall.total_feedbacks as f64,
            Some(last.overall.total_feedbacks as f64),
        ),
        strengths: MetricChange::new(current.strengths.len() as f64, Some(last.strengths.len() as f64)),
        weaknesses: MetricChange::new(current.weaknesses.len() as f64, Some(last.weaknesses.len() as f64)),
    };

    let accuracy_change = comparison.metrics.accuracy.change;
    let weaknesses_change = current.weaknesses.len() as i64 - last.weaknesses.len() as i64;
    let strengths_change = current.strengths.len() as i64 - last.strengths.len() as i64;
    comparison.trend = classify_trend(accuracy_change, weaknesses_change);

    if accuracy_change > 1.0 {
        comparison.improvements.push(Change {
            metric: "accuracy".to_string(),
            change: format!("+{:.1}%", accuracy_change),
            description: format!("Accuracy rose by {:.1} points", accuracy_change),
            severity: None,
            details: Vec::new(),
        });
    }
    if weaknesses_change < 0 {
        comparison.improvements.push(Change {
            metric: "weaknesses".to_string(),
            change: weaknesses_change.to_string(),
            description: format!("{} fewer weakness(es)", weaknesses_change.abs()),
            severity: None,
            details: Vec::new(),
        });
    }
    if strengths_change > 0 {
        comparison.improvements.push(Change {
            metric: "strengths".to_string(),
            change: format!("+{}", strengths_change),
            description: format!("{} new strength(s)", strengths_change),
            severity: None,
            details: Vec::new(),
        });
    }

    if accuracy_change < -1.0 {
        comparison.degradations.push(Change {
            metric: "accuracy".to_string(),
            change: format!("{:.1}%", accuracy_change),
            description: format!("Accuracy fell by {:.1} points", accuracy_change.abs()),
            severity: Some(if accuracy_change.abs() > 5.0 { Priority::Haute } else { Priority::Moyenne }),
            details: Vec::new(),
        });
    }
    if weaknesses_change > 0 {
        comparison.degradations.push(Change {
            metric: "weaknesses".to_string(),
            change: format!("+{}", weaknesses_change),
            description: format!("{} more weakness(es)", weaknesses_change),
            severity: Some(if weaknesses_change > WEAKNESS_TREND_DELTA { Priority::Haute } else { Priority::Moyenne }),
            details: Vec::new(),
        });
    }
    if strengths_change < 0 {
        comparison.degradations.push(Change {
            metric: "strengths".to_string(),
            change: strengths_change.to_string(),
            description: format!("{} strength(s) lost", strengths_change.abs()),
            severity: Some(Priority::Moyenne),
            details: Vec::new(),
        });
    }

    let current_errors = &current.details.patterns.common_mistakes;
    let previous_errors = &last.details.patterns.common_mistakes;

    comparison.persistent_errors = current_errors
        .iter()
        .filter(|c| previous_errors.iter().any(|p| same_mistake(c, p) && c.frequency >= p.frequency))
        .cloned()
        .collect();
    comparison.new_errors = current_errors
        .iter()
        .filter(|c| !previous_errors.iter().any(|p| same_mistake(c, p)))
        .cloned()
        .collect();
    comparison.fixed_errors = previous_errors
        .iter()
        .filter(|p| !current_errors.iter().any(|c| same_mistake(c, p)))
        .cloned()
        .collect();

    if !comparison.persistent_errors.is_empty() {
        comparison.degradations.push(Change {
            metric: "persistent_errors".to_string(),
            change: comparison.persistent_errors.len().to_string(),
            description: format!("{} error(s) persist since the last critique", comparison.persistent_errors.len()),
            severity: Some(Priority::Haute),
            details: mistake_labels(&comparison.persistent_errors),
        });
    }
    if !comparison.new_errors.is_empty() {
        comparison.degradations.push(Change {
            metric: "new_errors".to_string(),
            change: comparison.new_errors.len().to_string(),
            description: format!("{} new error(s) detected", comparison.new_errors.len()),
            severity: Some(Priority::Moyenne),
            details: mistake_labels(&comparison.new_errors),
        });
    }
    if !comparison.fixed_errors.is_empty() {
        comparison.improvements.push(Change {
            metric: "fixed_errors".to_string(),
            change: comparison.fixed_errors.len().to_string(),
            description: format!("{} error(s) fixed since the last critique", comparison.fixed_errors.len()),
            severity: None,
            details: mistake_labels(&comparison.fixed_errors),
        });
    }

    comparison
}
