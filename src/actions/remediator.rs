//! Remediation steps backed by the real services

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use super::RemediationSteps;
use crate::feedback::AutoValidator;
use crate::learning::{ContinuousLearner, Retrainer};

/// Runs remediation steps against the validator, retrainer and learner
pub struct Remediator {
    validator: Arc<AutoValidator>,
    retrainer: Arc<Retrainer>,
    learner: Arc<ContinuousLearner>,
}

impl Remediator {
    pub fn new(validator: Arc<AutoValidator>, retrainer: Arc<Retrainer>, learner: Arc<ContinuousLearner>) -> Self {
        Self { validator, retrainer, learner }
    }
}

#[async_trait]
impl RemediationSteps for Remediator {
    async fn auto_validate(&self) -> Result<String> {
        let summary = self.validator.validate_pending().await?;
        Ok(format!("{} of {} pending feedbacks validated", summary.validated, summary.examined))
    }

    async fn retrain(&self) -> Result<String> {
        let summary = self.retrainer.retrain().await?;
        Ok(format!("retrained on {} records (cursor {})", summary.trained, summary.cursor))
    }

    async fn continuous_learn(&self) -> Result<String> {
        let cycle = self.learner.process_new_approved().await?;
        Ok(format!("learned {} new records (cursor {})", cycle.trained, cycle.cursor_after))
    }
}
