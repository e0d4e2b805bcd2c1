//! Domain errors
//!
//! Most of the crate propagates `anyhow::Result`. The variants here are the
//! ones callers branch on, e.g. the learner skips malformed records but aborts
//! a batch on store failures.

use thiserror::Error;

/// Errors raised by the translation engine's domain rules
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Target language outside the supported set
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// Domain type name that maps to no model
    #[error("Unknown domain type: {0}")]
    UnknownDomainType(String),

    /// Feedback record that cannot be used as training data
    #[error("Malformed feedback record {id}: {reason}")]
    MalformedFeedback { id: i64, reason: String },

    /// Correction event missing a required field
    #[error("Invalid correction: {0}")]
    InvalidCorrection(String),

    /// Feedback record lookup failed
    #[error("Feedback record not found: {0}")]
    FeedbackNotFound(i64),

    /// Approval state change that the lifecycle does not allow
    #[error("Invalid transition for feedback {id}: {from} -> {to}")]
    InvalidTransition { id: i64, from: String, to: String },

    /// Configuration value that cannot be used
    #[error("Configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Whether the error marks a record that should be skipped, not retried
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            EngineError::MalformedFeedback { .. }
                | EngineError::UnsupportedLanguage(_)
                | EngineError::UnknownDomainType(_)
        )
    }
}

/// Check whether an `anyhow` error wraps a malformed-record error
pub fn is_malformed(err: &anyhow::Error) -> bool {
    err.downcast_ref::<EngineError>()
        .map(EngineError::is_malformed)
        .unwrap_or(false)
}
