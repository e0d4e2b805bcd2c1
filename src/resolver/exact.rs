//! Exact key lookup

use super::{Resolution, ResolutionStrategy, Strategy};
use crate::memory::ModelTable;

/// Returns the most reinforced candidate of an exact key match.
///
/// No probability floor: any match beats none.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExactStrategy;

impl ResolutionStrategy for ExactStrategy {
    fn kind(&self) -> Strategy {
        Strategy::Exact
    }

    fn resolve(&self, table: &ModelTable, key: &str) -> Option<Resolution> {
        table.best(key).map(|candidate| Resolution {
            translation: candidate.translation,
            confidence: candidate.probability,
            strategy: Strategy::Exact,
            matched_key: Some(key.to_string()),
        })
    }
}
