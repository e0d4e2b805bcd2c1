//! Edit-distance match against every known key

use super::similarity::similarity;
use super::{Resolution, ResolutionStrategy, Strategy};
use crate::memory::ModelTable;

/// Picks the key/candidate pair with the highest `similarity * probability`
/// among keys whose similarity is strictly above the threshold.
#[derive(Debug, Clone, Copy)]
pub struct FuzzyStrategy {
    threshold: f64,
}

impl FuzzyStrategy {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl ResolutionStrategy for FuzzyStrategy {
    fn kind(&self) -> Strategy {
        Strategy::Fuzzy
    }

    fn resolve(&self, table: &ModelTable, key: &str) -> Option<Resolution> {
        let mut best: Option<Resolution> = None;

        for (candidate_key, _) in table.iter() {
            let sim = similarity(key, candidate_key);
            if sim <= self.threshold {
                continue;
            }
            let Some(candidate) = table.best(candidate_key) else {
                continue;
            };
            let score = sim * candidate.probability;
            if best.as_ref().map_or(true, |b| score > b.confidence) {
                best = Some(Resolution {
                    translation: candidate.translation,
                    confidence: score,
                    strategy: Strategy::Fuzzy,
                    matched_key: Some(candidate_key.clone()),
                });
            }
        }

        best
    }
}
