//! Learning from approved feedback
//!
//! The continuous learner applies new approvals incrementally behind a
//! persisted cursor; the retrainer rebuilds every model from scratch and
//! resets that cursor. Both mutate the memory only through its gate.

pub mod continuous;
pub mod cursor;
pub mod retrain;

pub use continuous::{ContinuousLearner, LearningCycle};
pub use cursor::LearningCursor;
pub use retrain::{RetrainSummary, Retrainer};
