//! Adaptive Translation - Recipe Translation Engine Library
//!
//! A self-training translation memory for recipe content with:
//! - Weighted candidate tables per domain type and language
//! - Exact, fuzzy and n-gram resolution strategies
//! - Feedback lifecycle with reference-based auto-validation
//! - Continuous learning behind a persisted cursor, plus full retrain
//! - Evaluation against sample recipes
//! - Self-critique with trend comparison and remediation challenges
//! - Automatic remediation actions and a periodic daemon
//!
//! # Example
//!
//! ```ignore
//! use adaptive_translation::{AdaptiveEngine, Config, DomainType, Language};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = AdaptiveEngine::open(Config::load()?).await?;
//!     if let Some(resolution) = engine.translate("chicken", DomainType::Ingredient, Language::Fr).await {
//!         println!("{}", resolution.translation);
//!     }
//!     Ok(())
//! }
//! ```

// Core modules (order matters for cross-module dependencies)
pub mod error;
pub mod types;
pub mod config;
pub mod memory;
pub mod resolver;
pub mod feedback;
pub mod learning;

// Analysis and automation
pub mod evaluation;
pub mod reports;
pub mod critique;
pub mod actions;
pub mod scheduler;
pub mod engine;
pub mod daemon;
pub mod cli;

// Re-export commonly used types for convenience
pub use config::Config;
pub use engine::{AdaptiveEngine, CritiqueOutcome, EngineStats};
pub use error::EngineError;
pub use resolver::{Resolution, TranslationResolver};
pub use types::{ApprovalState, Correction, DomainType, FeedbackRecord, Language};
