//! Feedback lifecycle
//!
//! Correction events become pending feedback records. Records move to
//! approved (manually or via the auto-validator) or rejected; approved
//! records are the only training input and are never modified afterwards.

pub mod reference;
pub mod sqlite;
pub mod validator;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

pub use reference::{ReferenceDictionary, ReferenceEntry};
pub use sqlite::SqliteFeedbackStore;
pub use validator::{AutoValidator, ValidationSummary, AUTO_VALIDATOR};

use crate::error::EngineError;
use crate::types::{ApprovalState, Correction, DomainType, FeedbackRecord, Language};

/// Approver name used for manual approvals without an explicit name
pub const ADMIN_APPROVER: &str = "admin";

/// Counts for one domain type
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateCounts {
    pub total: u64,
    pub approved: u64,
    pub pending: u64,
    pub rejected: u64,
}

impl StateCounts {
    pub fn add(&mut self, state: ApprovalState, count: u64) {
        self.total += count;
        match state {
            ApprovalState::Approved => self.approved += count,
            ApprovalState::Pending => self.pending += count,
            ApprovalState::Rejected => self.rejected += count,
        }
    }
}

/// Aggregate feedback statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedbackStats {
    #[serde(flatten)]
    pub counts: StateCounts,
    pub by_type: BTreeMap<String, StateCounts>,
    pub by_language: BTreeMap<String, u64>,
}

/// A recurring correction: the same wrong translation fixed the same way
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorPattern {
    pub original: String,
    pub wrong: Option<String>,
    pub correct: String,
    pub domain_type: String,
    pub language: String,
    pub frequency: u64,
}

/// An original text that keeps receiving corrections
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecurringOriginal {
    pub original: String,
    pub domain_type: String,
    pub language: String,
    pub count: u64,
}

/// Durable storage of feedback records
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Store a new pending record
    async fn insert(&self, correction: &Correction) -> Result<FeedbackRecord>;

    async fn get(&self, id: i64) -> Result<Option<FeedbackRecord>>;

    /// Every pending record, oldest first
    async fn fetch_pending(&self) -> Result<Vec<FeedbackRecord>>;

    /// Approved records with id above `cursor`, ascending, at most `limit`
    async fn fetch_approved_since(&self, cursor: i64, limit: usize) -> Result<Vec<FeedbackRecord>>;

    /// Every approved record, ascending
    async fn fetch_approved_all(&self) -> Result<Vec<FeedbackRecord>>;

    async fn mark_approved(&self, id: i64, approver: &str) -> Result<()>;

    /// Approve only if the record is still pending; `false` if it moved on
    async fn approve_if_pending(&self, id: i64, approver: &str) -> Result<bool>;

    async fn mark_rejected(&self, id: i64) -> Result<()>;

    /// Most recent records, optionally filtered by state
    async fn list(&self, state: Option<ApprovalState>, limit: usize) -> Result<Vec<FeedbackRecord>>;

    async fn stats(&self) -> Result<FeedbackStats>;

    /// Recurring corrections among approved and pending records whose
    /// suggestion differs from the current translation, most frequent first
    async fn error_patterns(&self, limit: usize) -> Result<Vec<ErrorPattern>>;

    /// Originals with the most approved or pending corrections
    async fn recurring_originals(&self, limit: usize) -> Result<Vec<RecurringOriginal>>;
}

/// Lifecycle manager over a feedback store
#[derive(Clone)]
pub struct FeedbackService {
    store: Arc<dyn FeedbackStore>,
}

impl FeedbackService {
    pub fn new(store: Arc<dyn FeedbackStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn FeedbackStore> {
        &self.store
    }

    /// Validate a correction event and store it as pending
    pub async fn submit(&self, correction: Correction) -> Result<FeedbackRecord> {
        if correction.original_text.trim().is_empty() {
            return Err(EngineError::InvalidCorrection("original text is required".to_string()).into());
        }
        if correction.suggested_translation.trim().is_empty() {
            return Err(EngineError::InvalidCorrection("suggested translation is required".to_string()).into());
        }
        let language = correction.target_language.parse::<Language>()?;
        let domain = correction.domain_type.parse::<DomainType>()?;

        // aliases are stored under their canonical name
        let correction = Correction {
            domain_type: domain.as_str().to_string(),
            target_language: language.code().to_string(),
            ..correction
        };
        let record = self.store.insert(&correction).await?;
        info!("Feedback {} submitted ({} {} '{}')", record.id, record.domain_type, record.target_language, record.original_text);
        Ok(record)
    }

    /// Approve a record manually.
    ///
    /// Approving an approved record is a no-op; rejected records can be
    /// approved as a manual override.
    pub async fn approve(&self, id: i64, approver: &str) -> Result<FeedbackRecord> {
        let record = self.store.get(id).await?
            .ok_or(EngineError::FeedbackNotFound(id))?;

        if record.approval == ApprovalState::Approved {
            return Ok(record);
        }

        self.store.mark_approved(id, approver).await?;
        info!("Feedback {} approved by {}", id, approver);
        self.store.get(id).await?
            .ok_or_else(|| EngineError::FeedbackNotFound(id).into())
    }

    /// Reject a record; approved records cannot be rejected
    pub async fn reject(&self, id: i64) -> Result<FeedbackRecord> {
        let record = self.store.get(id).await?
            .ok_or(EngineError::FeedbackNotFound(id))?;

        match record.approval {
            ApprovalState::Rejected => Ok(record),
            ApprovalState::Approved => Err(EngineError::InvalidTransition {
                id,
                from: record.approval.to_string(),
                to: ApprovalState::Rejected.to_string(),
            }
            .into()),
            ApprovalState::Pending => {
                self.store.mark_rejected(id).await?;
                info!("Feedback {} rejected", id);
                self.store.get(id).await?
                    .ok_or_else(|| EngineError::FeedbackNotFound(id).into())
            }
        }
    }

    pub async fn list(&self, state: Option<ApprovalState>, limit: usize) -> Result<Vec<FeedbackRecord>> {
        self.store.list(state, limit).await
    }

    pub async fn stats(&self) -> Result<FeedbackStats> {
        self.store.stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn correction(original: &str, suggested: &str, lang: &str) -> Correction {
        Correction {
            domain_type: "ingredient".to_string(),
            original_text: original.to_string(),
            current_translation: Some("wrong".to_string()),
            suggested_translation: suggested.to_string(),
            target_language: lang.to_string(),
        }
    }

    async fn service() -> FeedbackService {
        let store = SqliteFeedbackStore::in_memory().unwrap();
        FeedbackService::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_submit_validates() {
        let service = service().await;
        assert!(service.submit(correction("", "poulet", "fr")).await.is_err());
        assert!(service.submit(correction("chicken", " ", "fr")).await.is_err());

        let err = service.submit(correction("chicken", "Huhn", "de")).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<EngineError>(),
            Some(&EngineError::UnsupportedLanguage("de".to_string()))
        );

        let record = service.submit(correction("chicken", "poulet", "fr")).await.unwrap();
        assert_eq!(record.approval, ApprovalState::Pending);
    }

    #[tokio::test]
    async fn test_approve_and_reject_transitions() {
        let service = service().await;
        let a = service.submit(correction("chicken", "poulet", "fr")).await.unwrap();
        let b = service.submit(correction("beef", "boeuf", "fr")).await.unwrap();

        let approved = service.approve(a.id, ADMIN_APPROVER).await.unwrap();
        assert_eq!(approved.approval, ApprovalState::Approved);
        assert_eq!(approved.approved_by.as_deref(), Some("admin"));
        assert!(approved.approved_at.is_some());

        // approved records are immutable
        assert!(service.reject(a.id).await.is_err());

        let rejected = service.reject(b.id).await.unwrap();
        assert_eq!(rejected.approval, ApprovalState::Rejected);

        // manual override
        let overridden = service.approve(b.id, "chef").await.unwrap();
        assert_eq!(overridden.approval, ApprovalState::Approved);
    }

    #[tokio::test]
    async fn test_aliases_stored_canonically() {
        let service = service().await;
        let mut plural = correction("chicken", "poulet", "FR");
        plural.domain_type = "ingredients".to_string();
        let mut summary = correction("Stir well", "Bien remuer", "fr");
        summary.domain_type = "summary".to_string();

        let a = service.submit(plural).await.unwrap();
        let b = service.submit(summary).await.unwrap();
        service.submit(correction("beef", "boeuf", "fr")).await.unwrap();
        assert_eq!(a.domain_type, "ingredient");
        assert_eq!(a.target_language, "fr");
        assert_eq!(b.domain_type, "instruction");

        let stats = service.stats().await.unwrap();
        assert_eq!(stats.by_type.keys().collect::<Vec<_>>(), vec!["ingredient", "instruction"]);
        assert_eq!(stats.by_type["ingredient"].total, 2);
    }

    #[tokio::test]
    async fn test_approve_missing_record() {
        let service = service().await;
        let err = service.approve(42, ADMIN_APPROVER).await.unwrap_err();
        assert_eq!(err.downcast_ref::<EngineError>(), Some(&EngineError::FeedbackNotFound(42)));
    }
}
