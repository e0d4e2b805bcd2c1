//! Findings and recommendations
//!
//! Pure functions from gathered inputs to a critique report; no I/O.

use std::collections::BTreeMap;

use super::{
    AccuracyPoint, CritiqueDetails, CritiqueReport, ErrorTally, EvaluationAnalysis, Finding,
    ImprovementSuggestion, Overall, Recommendation, TranslationPatterns,
};
use crate::evaluation::{EvaluationReport, MAX_EXAMPLES};
use crate::feedback::ErrorPattern;
use crate::types::{DomainType, Language, Priority};

pub const EXCELLENT_ACCURACY: f64 = 80.0;
pub const FAIR_ACCURACY: f64 = 60.0;
pub const LOW_ACCURACY: f64 = 50.0;
pub const RETRAIN_ACCURACY: f64 = 70.0;
/// Learned translations for a domain type to count as well covered
pub const WELL_COVERED: usize = 100;
pub const POORLY_COVERED: usize = 50;
pub const LARGE_KNOWLEDGE: usize = 500;
pub const APPROVED_STRENGTH: u64 = 100;
pub const MISSING_ALERT: u64 = 100;
pub const PENDING_ALERT: u64 = 50;

pub const COMMON_ERRORS_LIMIT: usize = 20;
pub const ERROR_PATTERNS_LIMIT: usize = 50;
const COMMON_MISTAKES: usize = 20;
const LANGUAGE_ERRORS: usize = 10;
/// Accumulated corrections for a domain type before a suggestion is made
const SUGGESTION_THRESHOLD: u64 = 5;
const URGENT_SUGGESTION: u64 = 20;

/// Aggregate evaluation reports (newest first)
pub fn analyze_evaluations(reports: &[EvaluationReport]) -> EvaluationAnalysis {
    let mut analysis = EvaluationAnalysis {
        reports_considered: reports.len(),
        ..Default::default()
    };

    for report in reports {
        analysis.total_tests += report.totals.total();
        analysis.total_correct += report.totals.correct;
        analysis.total_incorrect += report.totals.incorrect;
        analysis.total_missing += report.totals.missing;
        analysis.accuracy_trend.push(AccuracyPoint { timestamp: report.timestamp, accuracy: report.accuracy });

        for (domain, counts) in &report.by_domain {
            if counts.incorrect == 0 {
                continue;
            }
            let tally = analysis.errors_by_type.entry(domain.clone()).or_default();
            tally.count += counts.incorrect;
            if let Some(examples) = report.examples.get(domain) {
                let room = MAX_EXAMPLES.saturating_sub(tally.examples.len());
                tally.examples.extend(examples.iter().take(room).cloned());
            }
        }
    }

    if analysis.total_tests > 0 {
        analysis.average_accuracy = analysis.total_correct as f64 / analysis.total_tests as f64 * 100.0;
    }
    analysis
}

/// Group recurring corrections (most frequent first)
pub fn analyze_patterns(patterns: &[ErrorPattern]) -> TranslationPatterns {
    let mut result = TranslationPatterns {
        common_mistakes: patterns.iter().take(COMMON_MISTAKES).cloned().collect(),
        ..Default::default()
    };

    for language in Language::ALL {
        let errors: Vec<ErrorPattern> = patterns
            .iter()
            .filter(|p| p.language == language.code())
            .take(LANGUAGE_ERRORS)
            .cloned()
            .collect();
        result.language_errors.insert(language.to_string(), errors);
    }

    let mut per_type: BTreeMap<&str, u64> = BTreeMap::new();
    for pattern in patterns {
        *per_type.entry(pattern.domain_type.as_str()).or_default() += pattern.frequency;
    }
    for (domain_type, count) in per_type {
        if count > SUGGESTION_THRESHOLD {
            result.suggestions.push(ImprovementSuggestion {
                domain_type: domain_type.to_string(),
                priority: if count > URGENT_SUGGESTION { Priority::Haute } else { Priority::Moyenne },
                suggestion: format!("Improve {} translations ({} errors detected)", domain_type, count),
                count,
            });
        }
    }
    result
}

fn finding(category: &str, description: String, evidence: String, impact: Option<&str>) -> Finding {
    Finding {
        category: category.to_string(),
        description,
        evidence,
        impact: impact.map(str::to_string),
    }
}

fn recommendation(priority: Priority, action: String, reason: String, steps: &[&str]) -> Recommendation {
    Recommendation {
        priority,
        action,
        reason,
        steps: steps.iter().map(|s| s.to_string()).collect(),
    }
}

/// Derive findings and recommendations. Comparison and challenges are
/// left empty for the caller to fill in.
pub fn build_report(details: CritiqueDetails) -> CritiqueReport {
    let eval = &details.evaluation;
    let feedback = &details.feedback.stats.counts;
    let accuracy = eval.average_accuracy;

    let mut report = CritiqueReport::empty(Overall {
        accuracy,
        total_tests: eval.total_tests,
        total_feedbacks: feedback.total,
    });

    // strengths
    if accuracy >= EXCELLENT_ACCURACY {
        report.strengths.push(finding(
            "accuracy",
            format!("Excellent accuracy of {:.1}%", accuracy),
            format!("{} correct translations out of {} tested", eval.total_correct, eval.total_tests),
            None,
        ));
    } else if accuracy >= FAIR_ACCURACY {
        report.strengths.push(finding(
            "accuracy",
            format!("Fair accuracy of {:.1}%", accuracy),
            format!("{} correct translations out of {} tested", eval.total_correct, eval.total_tests),
            None,
        ));
    }

    let learned: Vec<(DomainType, usize)> = DomainType::ALL
        .iter()
        .map(|&d| (d, details.memory.entries_for(d)))
        .collect();
    let total_learned: usize = learned.iter().map(|(_, n)| n).sum();
    if total_learned >= LARGE_KNOWLEDGE {
        report.strengths.push(finding(
            "coverage",
            format!("Large knowledge base of {} learned translations", total_learned),
            "The memory has learned from many examples".to_string(),
            None,
        ));
    }
    for &(domain, count) in &learned {
        if count >= WELL_COVERED {
            report.strengths.push(finding(
                "type coverage",
                format!("{} is well covered", domain),
                format!("{} learned translations", count),
                None,
            ));
        }
    }
    if feedback.approved >= APPROVED_STRENGTH {
        report.strengths.push(finding(
            "learning",
            format!("{} approved feedbacks used for training", feedback.approved),
            "The memory keeps learning from user corrections".to_string(),
            None,
        ));
    }

    // weaknesses
    if accuracy < LOW_ACCURACY && eval.total_tests > 0 {
        report.weaknesses.push(finding(
            "accuracy",
            format!("Low accuracy of {:.1}%", accuracy),
            format!("{} errors out of {} tests", eval.total_incorrect, eval.total_tests),
            Some("Users receive incorrect translations"),
        ));
    }
    if eval.total_missing > eval.total_correct {
        report.weaknesses.push(finding(
            "coverage",
            format!("Many missing translations ({})", eval.total_missing),
            "No translation found for many terms".to_string(),
            Some("External fallback is used too often"),
        ));
    }
    for &(domain, count) in &learned {
        if count < POORLY_COVERED {
            report.weaknesses.push(finding(
                "type coverage",
                format!("{} is poorly covered", domain),
                format!("Only {} learned translations", count),
                Some("Translations of this type are often wrong or missing"),
            ));
        }
    }

    let mut error_types: Vec<(&String, &ErrorTally)> = eval.errors_by_type.iter().filter(|(_, t)| t.count > 0).collect();
    error_types.sort_by(|a, b| b.1.count.cmp(&a.1.count));
    for (domain, tally) in error_types.iter().take(3) {
        let examples: Vec<&str> = tally.examples.iter().take(3).map(|e| e.original.as_str()).collect();
        report.weaknesses.push(finding(
            "frequent errors",
            format!("{} errors detected for {}", tally.count, domain),
            format!("Examples: {}", examples.join(", ")),
            Some("This type is often mistranslated"),
        ));
    }

    if feedback.pending > feedback.approved {
        report.weaknesses.push(finding(
            "validation",
            format!("{} feedbacks awaiting validation", feedback.pending),
            format!("Only {} approved", feedback.approved),
            Some("New corrections are not learned quickly"),
        ));
    }
    if let Some(top) = details.feedback.common_errors.first() {
        report.weaknesses.push(finding(
            "recurring errors",
            format!("\"{}\" is often corrected ({} times)", top.original, top.count),
            format!("Frequent {} correction in {}", top.domain_type, top.language),
            Some("Users must fix the same error repeatedly"),
        ));
    }
    if let Some(top) = details.patterns.common_mistakes.first() {
        report.weaknesses.push(finding(
            "error pattern",
            format!(
                "Frequent error: \"{}\" -> \"{}\" (should be \"{}\")",
                top.original,
                top.wrong.as_deref().unwrap_or(""),
                top.correct
            ),
            format!("Seen {} times in feedback", top.frequency),
            Some("The same mistake is made systematically"),
        ));
    }
    for (language, errors) in &details.patterns.language_errors {
        if let Some(first) = errors.first() {
            report.weaknesses.push(finding(
                &format!("{} errors", language.to_uppercase()),
                format!("{} language specific error patterns", errors.len()),
                format!("Example: \"{}\" mistranslated", first.original),
                None,
            ));
        }
    }

    // recommendations
    if accuracy < RETRAIN_ACCURACY {
        report.recommendations.push(recommendation(
            Priority::Haute,
            "Retrain the model with more data".to_string(),
            format!("Current accuracy: {:.1}%", accuracy),
            &["Validate pending feedback", "Run a full retrain", "Add reference translations"],
        ));
    }
    if eval.total_missing > MISSING_ALERT {
        report.recommendations.push(recommendation(
            Priority::Haute,
            "Enrich the memory with more translations".to_string(),
            format!("{} missing translations detected", eval.total_missing),
            &["Add translations for the most frequent terms", "Validate user feedback", "Import culinary dictionaries"],
        ));
    }
    if let Some((domain, tally)) = error_types.first() {
        report.recommendations.push(recommendation(
            Priority::Moyenne,
            format!("Improve {} translations", domain),
            format!("{} errors detected", tally.count),
            &["Review the error examples", "Add correct translations", "Retrain the model"],
        ));
    }
    if feedback.pending > PENDING_ALERT {
        report.recommendations.push(recommendation(
            Priority::Moyenne,
            "Validate pending feedback".to_string(),
            format!("{} feedbacks not yet used for training", feedback.pending),
            &["Run auto-validation", "Approve important feedback manually", "Reject wrong feedback"],
        ));
    }
    for &(domain, count) in &learned {
        if count < POORLY_COVERED {
            report.recommendations.push(recommendation(
                Priority::Basse,
                format!("Enrich the {} model", domain),
                format!("Only {} learned translations", count),
                &["Collect more feedback for this type", "Use external data sources", "Retrain the model"],
            ));
        }
    }
    for suggestion in &details.patterns.suggestions {
        report.recommendations.push(recommendation(
            suggestion.priority,
            suggestion.suggestion.clone(),
            format!("{} errors detected for this type", suggestion.count),
            &["Review the error examples", "Add the correct translations", "Retrain with the corrections"],
        ));
    }

    report.details = details;
    report
}
