//! Word-bigram overlap match, accumulated over every overlapping key

use std::collections::{BTreeMap, HashSet};

use super::similarity::word_bigrams;
use super::{Resolution, ResolutionStrategy, Strategy};
use crate::memory::{distribution, ModelTable};

/// Scores each candidate by `overlap * probability` summed across all keys
/// that share at least one bigram with the text; the best score must be
/// strictly above the threshold.
///
/// Summing lets a frequent key with modest overlap outvote a rarer key with
/// high overlap.
#[derive(Debug, Clone, Copy)]
pub struct NgramStrategy {
    threshold: f64,
}

impl NgramStrategy {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

/// Shared bigrams over the larger bigram count
fn overlap(text_bigrams: &[String], key_bigrams: &[String]) -> f64 {
    if text_bigrams.is_empty() || key_bigrams.is_empty() {
        return 0.0;
    }
    let key_set: HashSet<&String> = key_bigrams.iter().collect();
    let matches = text_bigrams.iter().filter(|b| key_set.contains(b)).count();
    matches as f64 / text_bigrams.len().max(key_bigrams.len()) as f64
}

impl ResolutionStrategy for NgramStrategy {
    fn kind(&self) -> Strategy {
        Strategy::Ngram
    }

    fn resolve(&self, table: &ModelTable, key: &str) -> Option<Resolution> {
        let text_bigrams = word_bigrams(key);
        if text_bigrams.is_empty() {
            return None;
        }

        let mut scores: BTreeMap<String, f64> = BTreeMap::new();
        for (candidate_key, weights) in table.iter() {
            let ratio = overlap(&text_bigrams, &word_bigrams(candidate_key));
            if ratio <= 0.0 {
                continue;
            }
            for candidate in distribution(weights) {
                *scores.entry(candidate.translation).or_insert(0.0) += ratio * candidate.probability;
            }
        }

        let mut best: Option<(String, f64)> = None;
        for (translation, score) in scores {
            if best.as_ref().map_or(true, |(_, s)| score > *s) {
                best = Some((translation, score));
            }
        }

        best.filter(|(_, score)| *score > self.threshold)
            .map(|(translation, score)| Resolution {
                translation,
                confidence: score.min(1.0),
                strategy: Strategy::Ngram,
                matched_key: None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(prefix: &str, range: std::ops::Range<usize>) -> Vec<String> {
        range.map(|i| format!("{}{}", prefix, i)).collect()
    }

    #[test]
    fn test_overlap_ratio() {
        let a = word_bigrams("bring the water to a boil");
        let b = word_bigrams("bring the water to room temperature");
        // shared: "bring the", "the water", "water to" over max(5, 5)
        assert!((overlap(&a, &b) - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_score_exactly_at_threshold_rejected() {
        // 11 words -> 10 bigrams; key shares the first 7
        let text = words("w", 0..11).join(" ");
        let mut key_words = words("w", 0..8);
        key_words.extend(words("zq", 8..11));
        let mut table = ModelTable::new();
        table.train(&key_words.join(" "), "match");

        assert!(NgramStrategy::new(0.7).resolve(&table, &text).is_none());
    }

    #[test]
    fn test_score_just_above_threshold_accepted() {
        // 101 words -> 100 bigrams; key shares the first 71
        let text = words("w", 0..101).join(" ");
        let mut key_words = words("w", 0..72);
        key_words.extend(words("zq", 72..101));
        let mut table = ModelTable::new();
        table.train(&key_words.join(" "), "match");

        let resolution = NgramStrategy::new(0.7).resolve(&table, &text).unwrap();
        assert_eq!(resolution.translation, "match");
        assert!((resolution.confidence - 0.71).abs() < 1e-9);
    }

    #[test]
    fn test_contributions_are_summed_across_keys() {
        let mut table = ModelTable::new();
        table.train("stir the sauce gently", "remuer la sauce");
        table.train("stir the sauce often", "remuer la sauce");

        // each key overlaps 2/3 alone; together they clear the threshold
        let resolution = NgramStrategy::new(0.7)
            .resolve(&table, "stir the sauce slowly")
            .unwrap();
        assert_eq!(resolution.translation, "remuer la sauce");
        assert_eq!(resolution.confidence, 1.0);
    }

    #[test]
    fn test_single_word_has_no_bigrams() {
        let mut table = ModelTable::new();
        table.train("rice", "riz");
        assert!(NgramStrategy::new(0.7).resolve(&table, "rice").is_none());
    }
}
