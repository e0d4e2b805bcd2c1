//! Weighted candidate table for one (domain type, language) model
//!
//! Maps a normalized source key to its observed translations and their
//! reinforcement weights. Probabilities are derived on read.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::normalize;

/// A candidate translation with its weight and derived probability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub translation: String,
    pub weight: u64,
    pub probability: f64,
}

/// Normalized distribution over a weight map, most probable first.
///
/// Equal weights are ordered by translation so the result is deterministic.
pub fn distribution(weights: &BTreeMap<String, u64>) -> Vec<Candidate> {
    let total: u64 = weights.values().sum();
    if total == 0 {
        return Vec::new();
    }

    let mut candidates: Vec<Candidate> = weights
        .iter()
        .map(|(translation, &weight)| Candidate {
            translation: translation.clone(),
            weight,
            probability: weight as f64 / total as f64,
        })
        .collect();

    // BTreeMap iteration is already sorted by translation, so a stable sort
    // on weight keeps the lexicographic tie-break.
    candidates.sort_by(|a, b| b.weight.cmp(&a.weight));
    candidates
}

/// In-memory model: source key -> translation -> weight
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelTable {
    entries: BTreeMap<String, BTreeMap<String, u64>>,
}

impl ModelTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a table from persisted entries, dropping empty weight maps
    pub fn from_entries(entries: BTreeMap<String, BTreeMap<String, u64>>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(key, weights)| {
                let weights: BTreeMap<String, u64> =
                    weights.into_iter().filter(|(_, w)| *w > 0).collect();
                (key, weights)
            })
            .filter(|(key, weights)| !key.is_empty() && !weights.is_empty())
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &BTreeMap<String, BTreeMap<String, u64>> {
        &self.entries
    }

    /// Reinforce `translation` for `source`; returns the new weight
    pub fn train(&mut self, source: &str, translation: &str) -> u64 {
        let key = normalize(source);
        let weight = self
            .entries
            .entry(key)
            .or_default()
            .entry(translation.trim().to_string())
            .or_insert(0);
        *weight += 1;
        *weight
    }

    /// Weight map for an already-normalized key
    pub fn weights(&self, key: &str) -> Option<&BTreeMap<String, u64>> {
        self.entries.get(key)
    }

    /// Probability distribution for a source text; empty if unseen
    pub fn probabilities(&self, source: &str) -> Vec<Candidate> {
        self.entries
            .get(&normalize(source))
            .map(distribution)
            .unwrap_or_default()
    }

    /// Most probable candidate for an already-normalized key
    pub fn best(&self, key: &str) -> Option<Candidate> {
        self.entries
            .get(key)
            .and_then(|weights| distribution(weights).into_iter().next())
    }

    /// Known source keys with their weight maps
    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeMap<String, u64>)> {
        self.entries.iter()
    }

    /// Number of source keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of (key, candidate) pairs
    pub fn candidate_count(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_train_normalizes_and_counts() {
        let mut table = ModelTable::new();
        assert_eq!(table.train(" Chicken ", "poulet"), 1);
        assert_eq!(table.train("chicken", "poulet"), 2);
        assert_eq!(table.train("CHICKEN", "poulet rôti"), 1);

        let weights = table.weights("chicken").unwrap();
        assert_eq!(weights["poulet"], 2);
        assert_eq!(weights["poulet rôti"], 1);
        assert_eq!(table.len(), 1);
        assert_eq!(table.candidate_count(), 2);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let mut table = ModelTable::new();
        for _ in 0..3 {
            table.train("onion", "oignon");
        }
        table.train("onion", "échalote");

        let probs = table.probabilities("Onion");
        assert_eq!(probs.len(), 2);
        assert_eq!(probs[0].translation, "oignon");
        assert!((probs[0].probability - 0.75).abs() < f64::EPSILON);
        let total: f64 = probs.iter().map(|c| c.probability).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unseen_key_is_empty() {
        let table = ModelTable::new();
        assert!(table.probabilities("garlic").is_empty());
        assert!(table.best("garlic").is_none());
    }

    #[test]
    fn test_best_prefers_weight_then_name() {
        let mut table = ModelTable::new();
        table.train("pepper", "poivron");
        table.train("pepper", "poivre");
        assert_eq!(table.best("pepper").unwrap().translation, "poivre");

        table.train("pepper", "poivron");
        assert_eq!(table.best("pepper").unwrap().translation, "poivron");
    }

    #[test]
    fn test_from_entries_drops_empty() {
        let mut entries = BTreeMap::new();
        entries.insert("salt".to_string(), BTreeMap::from([("sel".to_string(), 2)]));
        entries.insert("sugar".to_string(), BTreeMap::from([("sucre".to_string(), 0)]));
        let table = ModelTable::from_entries(entries);
        assert_eq!(table.len(), 1);
        assert!(table.weights("sugar").is_none());
    }
}
