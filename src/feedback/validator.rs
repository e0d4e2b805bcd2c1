//! Auto-validator
//!
//! Approves pending ingredient and unit feedback whose suggestion equals the
//! curated reference (case-insensitive). Everything else stays pending for
//! manual review.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{FeedbackStore, ReferenceDictionary};
use crate::types::{normalize, DomainType, FeedbackRecord};

/// Approver recorded for automatic approvals
pub const AUTO_VALIDATOR: &str = "auto-validator";

/// Outcome of one validation pass
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationSummary {
    /// Pending records examined
    pub examined: usize,
    /// Records auto-approved
    pub validated: usize,
    /// Records left pending
    pub left_pending: usize,
}

/// Compares pending feedback against the reference dictionary
pub struct AutoValidator {
    store: Arc<dyn FeedbackStore>,
    reference: &'static ReferenceDictionary,
}

impl AutoValidator {
    pub fn new(store: Arc<dyn FeedbackStore>) -> Self {
        Self::with_reference(store, ReferenceDictionary::builtin())
    }

    pub fn with_reference(store: Arc<dyn FeedbackStore>, reference: &'static ReferenceDictionary) -> Self {
        Self { store, reference }
    }

    /// Closed decision rule: only ingredients and units whose suggestion
    /// matches the reference for the record's language.
    pub fn matches_reference(&self, record: &FeedbackRecord) -> bool {
        let Some(domain) = record.domain() else {
            return false;
        };
        if !matches!(domain, DomainType::Ingredient | DomainType::Unit) {
            return false;
        }
        let (Some(language), Some(suggestion)) = (record.language(), record.suggestion()) else {
            return false;
        };

        self.reference
            .translation(domain, &record.original_text, language)
            .map(|expected| normalize(expected) == normalize(suggestion))
            .unwrap_or(false)
    }

    /// Run one validation pass over every pending record
    pub async fn validate_pending(&self) -> Result<ValidationSummary> {
        let pending = self.store.fetch_pending().await?;
        let mut summary = ValidationSummary {
            examined: pending.len(),
            ..Default::default()
        };

        for record in &pending {
            if !self.matches_reference(record) {
                summary.left_pending += 1;
                continue;
            }
            match self.store.approve_if_pending(record.id, AUTO_VALIDATOR).await {
                Ok(true) => {
                    debug!("Auto-approved feedback {} ('{}' -> '{}')",
                        record.id, record.original_text, record.suggestion().unwrap_or_default());
                    summary.validated += 1;
                }
                Ok(false) => {
                    debug!("Feedback {} is no longer pending, leaving it", record.id);
                }
                Err(e) => {
                    warn!("Failed to auto-approve feedback {}: {:#}", record.id, e);
                    summary.left_pending += 1;
                }
            }
        }

        info!("Auto-validation: {} examined, {} approved, {} left pending",
            summary.examined, summary.validated, summary.left_pending);
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::{ErrorPattern, FeedbackStats, RecurringOriginal, SqliteFeedbackStore};
    use crate::types::{ApprovalState, Correction};
    use chrono::Utc;
    use mockall::mock;

    mock! {
        pub Store {}

        #[async_trait::async_trait]
        impl FeedbackStore for Store {
            async fn insert(&self, correction: &Correction) -> Result<FeedbackRecord>;
            async fn get(&self, id: i64) -> Result<Option<FeedbackRecord>>;
            async fn fetch_pending(&self) -> Result<Vec<FeedbackRecord>>;
            async fn fetch_approved_since(&self, cursor: i64, limit: usize) -> Result<Vec<FeedbackRecord>>;
            async fn fetch_approved_all(&self) -> Result<Vec<FeedbackRecord>>;
            async fn mark_approved(&self, id: i64, approver: &str) -> Result<()>;
            async fn approve_if_pending(&self, id: i64, approver: &str) -> Result<bool>;
            async fn mark_rejected(&self, id: i64) -> Result<()>;
            async fn list(&self, state: Option<ApprovalState>, limit: usize) -> Result<Vec<FeedbackRecord>>;
            async fn stats(&self) -> Result<FeedbackStats>;
            async fn error_patterns(&self, limit: usize) -> Result<Vec<ErrorPattern>>;
            async fn recurring_originals(&self, limit: usize) -> Result<Vec<RecurringOriginal>>;
        }
    }

    fn correction(domain: &str, original: &str, suggested: &str, lang: &str) -> Correction {
        Correction {
            domain_type: domain.to_string(),
            original_text: original.to_string(),
            current_translation: None,
            suggested_translation: suggested.to_string(),
            target_language: lang.to_string(),
        }
    }

    #[tokio::test]
    async fn test_validates_only_reference_matches() {
        let store: Arc<dyn FeedbackStore> = Arc::new(SqliteFeedbackStore::in_memory().unwrap());
        let ok = store.insert(&correction("ingredient", "Chicken", "Poulet", "fr")).await.unwrap();
        let unit = store.insert(&correction("unit", "cup", "taza", "es")).await.unwrap();
        let wrong = store.insert(&correction("ingredient", "chicken", "poule", "fr")).await.unwrap();
        let instruction = store.insert(&correction("instruction", "stir", "remuer", "fr")).await.unwrap();
        let unknown = store.insert(&correction("ingredient", "saffron", "safran", "fr")).await.unwrap();

        let validator = AutoValidator::new(store.clone());
        let summary = validator.validate_pending().await.unwrap();
        assert_eq!(summary, ValidationSummary { examined: 5, validated: 2, left_pending: 3 });

        for (id, state) in [
            (ok.id, ApprovalState::Approved),
            (unit.id, ApprovalState::Approved),
            (wrong.id, ApprovalState::Pending),
            (instruction.id, ApprovalState::Pending),
            (unknown.id, ApprovalState::Pending),
        ] {
            assert_eq!(store.get(id).await.unwrap().unwrap().approval, state);
        }

        let approved = store.get(ok.id).await.unwrap().unwrap();
        assert_eq!(approved.approved_by.as_deref(), Some(AUTO_VALIDATOR));
    }

    #[tokio::test]
    async fn test_rejected_records_untouched() {
        let store: Arc<dyn FeedbackStore> = Arc::new(SqliteFeedbackStore::in_memory().unwrap());
        let record = store.insert(&correction("ingredient", "rice", "riz", "fr")).await.unwrap();
        store.mark_rejected(record.id).await.unwrap();

        let summary = AutoValidator::new(store.clone()).validate_pending().await.unwrap();
        assert_eq!(summary.examined, 0);
        assert_eq!(store.get(record.id).await.unwrap().unwrap().approval, ApprovalState::Rejected);
    }

    #[tokio::test]
    async fn test_record_rejected_after_fetch_stays_rejected() {
        let pending = FeedbackRecord {
            id: 7,
            domain_type: "ingredient".to_string(),
            original_text: "chicken".to_string(),
            current_translation: None,
            suggested_translation: Some("poulet".to_string()),
            target_language: "fr".to_string(),
            approval: ApprovalState::Pending,
            approved_by: None,
            created_at: Utc::now(),
            approved_at: None,
        };

        let mut store = MockStore::new();
        store.expect_fetch_pending().times(1).returning(move || Ok(vec![pending.clone()]));
        // an admin rejected it in between, so the conditional update matches nothing
        store
            .expect_approve_if_pending()
            .withf(|id, approver| *id == 7 && approver == AUTO_VALIDATOR)
            .times(1)
            .returning(|_, _| Ok(false));
        store.expect_mark_approved().times(0);

        let summary = AutoValidator::new(Arc::new(store)).validate_pending().await.unwrap();
        assert_eq!(summary.examined, 1);
        assert_eq!(summary.validated, 0);
    }
}
