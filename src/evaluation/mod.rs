//! Evaluation harness
//!
//! Runs the resolver over sample recipes and judges every ingredient,
//! unit and instruction against the reference dictionary.

pub mod harness;
pub mod source;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use harness::EvaluationHarness;
pub use source::{RecipeSource, SampleIngredient, SampleRecipe, TheMealDbSource};

/// Incorrect examples kept per domain type
pub const MAX_EXAMPLES: usize = 10;

/// Outcome of judging one item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Correct,
    Incorrect,
    Missing,
}

/// Counts for one domain type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainCounts {
    pub correct: u64,
    pub incorrect: u64,
    pub missing: u64,
}

impl DomainCounts {
    pub fn total(&self) -> u64 {
        self.correct + self.incorrect + self.missing
    }

    pub fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Correct => self.correct += 1,
            Verdict::Incorrect => self.incorrect += 1,
            Verdict::Missing => self.missing += 1,
        }
    }

    pub fn merge(&mut self, other: &DomainCounts) {
        self.correct += other.correct;
        self.incorrect += other.incorrect;
        self.missing += other.missing;
    }

    /// Correct share as a percentage; 0 when nothing was tested
    pub fn accuracy(&self) -> f64 {
        percentage(self.correct, self.total())
    }

    /// Share of items that received any translation, as a percentage
    pub fn coverage(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        100.0 - percentage(self.missing, total)
    }
}

fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// An item the resolver translated wrongly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationExample {
    pub original: String,
    pub translated: BTreeMap<String, String>,
    pub expected: BTreeMap<String, String>,
}

/// One evaluation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub timestamp: DateTime<Utc>,
    /// Recipe source that supplied the samples
    pub source: String,
    pub recipes: usize,
    /// Keyed by domain type name
    pub by_domain: BTreeMap<String, DomainCounts>,
    pub totals: DomainCounts,
    pub accuracy: f64,
    pub coverage: f64,
    pub examples: BTreeMap<String, Vec<EvaluationExample>>,
}

impl EvaluationReport {
    pub fn total(&self) -> u64 {
        self.totals.total()
    }
}
