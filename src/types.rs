//! Shared types used across modules
//!
//! Domain types, languages and feedback records are used by the memory,
//! the feedback lifecycle, the learner and the analyzers, so they live here
//! to avoid circular dependencies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::EngineError;

/// Normalize source text into a lookup key (lowercase, trimmed)
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Kind of recipe content a translation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DomainType {
    Ingredient,
    Instruction,
    RecipeName,
    Unit,
    Quantity,
}

impl DomainType {
    /// All domain types, in model order
    pub const ALL: [DomainType; 5] = [
        DomainType::Ingredient,
        DomainType::Instruction,
        DomainType::RecipeName,
        DomainType::Unit,
        DomainType::Quantity,
    ];

    /// Name of the model document backing this domain type
    pub fn model_name(&self) -> &'static str {
        match self {
            DomainType::Ingredient => "ingredients",
            DomainType::Instruction => "instructions",
            DomainType::RecipeName => "recipeNames",
            DomainType::Unit => "units",
            DomainType::Quantity => "quantity",
        }
    }

    /// Wire name as stored in feedback records
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainType::Ingredient => "ingredient",
            DomainType::Instruction => "instruction",
            DomainType::RecipeName => "recipeName",
            DomainType::Unit => "unit",
            DomainType::Quantity => "quantity",
        }
    }
}

impl FromStr for DomainType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ingredient" | "ingredients" => Ok(DomainType::Ingredient),
            // summaries share the instruction model
            "instruction" | "instructions" | "summary" => Ok(DomainType::Instruction),
            "recipeName" | "recipeNames" | "recipe_name" => Ok(DomainType::RecipeName),
            "unit" | "units" => Ok(DomainType::Unit),
            "quantity" => Ok(DomainType::Quantity),
            other => Err(EngineError::UnknownDomainType(other.to_string())),
        }
    }
}

impl std::fmt::Display for DomainType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Supported target language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Fr,
    Es,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::Fr, Language::Es];

    pub fn code(&self) -> &'static str {
        match self {
            Language::Fr => "fr",
            Language::Es => "es",
        }
    }
}

impl FromStr for Language {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fr" => Ok(Language::Fr),
            "es" => Ok(Language::Es),
            other => Err(EngineError::UnsupportedLanguage(other.to_string())),
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Approval state of a feedback record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalState {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalState {
    /// Integer code used by the feedback database
    pub fn code(&self) -> i64 {
        match self {
            ApprovalState::Pending => 0,
            ApprovalState::Approved => 1,
            ApprovalState::Rejected => -1,
        }
    }

    pub fn from_code(code: i64) -> Self {
        match code {
            1 => ApprovalState::Approved,
            -1 => ApprovalState::Rejected,
            _ => ApprovalState::Pending,
        }
    }
}

impl std::fmt::Display for ApprovalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApprovalState::Pending => write!(f, "pending"),
            ApprovalState::Approved => write!(f, "approved"),
            ApprovalState::Rejected => write!(f, "rejected"),
        }
    }
}

/// A stored user correction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedbackRecord {
    pub id: i64,
    /// Canonical domain type name
    pub domain_type: String,
    pub original_text: String,
    pub current_translation: Option<String>,
    pub suggested_translation: Option<String>,
    /// Lowercase language code
    pub target_language: String,
    pub approval: ApprovalState,
    pub approved_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
}

impl FeedbackRecord {
    /// Parsed domain type, if recognized
    pub fn domain(&self) -> Option<DomainType> {
        self.domain_type.parse().ok()
    }

    /// Parsed target language, if supported
    pub fn language(&self) -> Option<Language> {
        self.target_language.parse().ok()
    }

    /// Suggested translation, if present and not blank
    pub fn suggestion(&self) -> Option<&str> {
        self.suggested_translation
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// An incoming correction event, before it is stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Correction {
    pub domain_type: String,
    pub original_text: String,
    pub current_translation: Option<String>,
    pub suggested_translation: String,
    pub target_language: String,
}

/// A feedback record validated for training
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingSample {
    pub id: i64,
    pub domain: DomainType,
    pub language: Language,
    pub source: String,
    pub translation: String,
}

impl TryFrom<&FeedbackRecord> for TrainingSample {
    type Error = EngineError;

    fn try_from(record: &FeedbackRecord) -> Result<Self, Self::Error> {
        let malformed = |reason: &str| EngineError::MalformedFeedback {
            id: record.id,
            reason: reason.to_string(),
        };

        if record.original_text.trim().is_empty() {
            return Err(malformed("missing original text"));
        }
        let translation = record
            .suggestion()
            .ok_or_else(|| malformed("missing suggested translation"))?;
        if record.target_language.trim().is_empty() {
            return Err(malformed("missing target language"));
        }
        let language: Language = record
            .target_language
            .parse()
            .map_err(|e: EngineError| malformed(&e.to_string()))?;
        let domain: DomainType = record
            .domain_type
            .parse()
            .map_err(|e: EngineError| malformed(&e.to_string()))?;

        Ok(TrainingSample {
            id: record.id,
            domain,
            language,
            source: record.original_text.clone(),
            translation: translation.to_string(),
        })
    }
}

/// Priority label used by findings, recommendations and challenges
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Basse,
    Moyenne,
    Haute,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Basse => write!(f, "basse"),
            Priority::Moyenne => write!(f, "moyenne"),
            Priority::Haute => write!(f, "haute"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(original: &str, suggested: Option<&str>, lang: &str) -> FeedbackRecord {
        FeedbackRecord {
            id: 7,
            domain_type: "ingredient".to_string(),
            original_text: original.to_string(),
            current_translation: None,
            suggested_translation: suggested.map(|s| s.to_string()),
            target_language: lang.to_string(),
            approval: ApprovalState::Approved,
            approved_by: None,
            created_at: Utc::now(),
            approved_at: None,
        }
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Chicken "), "chicken");
        assert_eq!(normalize("chicken"), "chicken");
    }

    #[test]
    fn test_domain_aliases() {
        assert_eq!("summary".parse::<DomainType>().unwrap(), DomainType::Instruction);
        assert_eq!("recipeName".parse::<DomainType>().unwrap(), DomainType::RecipeName);
        assert_eq!(DomainType::Quantity.model_name(), "quantity");
        assert!("dessert".parse::<DomainType>().is_err());
    }

    #[test]
    fn test_language_parse() {
        assert_eq!("FR".parse::<Language>().unwrap(), Language::Fr);
        assert_eq!(
            "de".parse::<Language>(),
            Err(EngineError::UnsupportedLanguage("de".to_string()))
        );
    }

    #[test]
    fn test_training_sample_validation() {
        let ok = TrainingSample::try_from(&record("Chicken", Some("poulet"), "fr")).unwrap();
        assert_eq!(ok.language, Language::Fr);
        assert_eq!(ok.translation, "poulet");

        let missing = TrainingSample::try_from(&record("Chicken", Some("  "), "fr"));
        assert!(matches!(missing, Err(EngineError::MalformedFeedback { id: 7, .. })));

        let bad_lang = TrainingSample::try_from(&record("Chicken", Some("huhn"), "de"));
        assert!(bad_lang.unwrap_err().is_malformed());
    }

    #[test]
    fn test_priority_serialization() {
        assert_eq!(serde_json::to_string(&Priority::Haute).unwrap(), "\"haute\"");
        assert!(Priority::Haute > Priority::Moyenne);
    }
}
