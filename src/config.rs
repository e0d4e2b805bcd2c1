//! Configuration management
//!
//! Manages storage locations, resolver thresholds, scheduling intervals,
//! evaluation sampling and critique retention.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::EngineError;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Where models, reports and the feedback database live
    #[serde(default)]
    pub storage: StorageConfig,
    /// Resolver and learner settings
    #[serde(default)]
    pub engine: EngineConfig,
    /// Periodic task intervals
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Evaluation harness settings
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    /// Self-critique and action history retention
    #[serde(default)]
    pub critique: CritiqueConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Overrides the platform data directory
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Feedback database file name, relative to the data directory
    #[serde(default = "default_feedback_db")]
    pub feedback_db: String,
}

fn default_feedback_db() -> String {
    "feedback.db".to_string()
}

impl StorageConfig {
    /// Resolve the effective data directory
    pub fn resolve_data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => data_dir(),
        }
    }

    /// Model documents under `data_dir`
    pub fn models_dir(&self, data_dir: &Path) -> PathBuf {
        data_dir.join("models")
    }

    /// Evaluation, critique and action reports under `data_dir`
    pub fn reports_dir(&self, data_dir: &Path) -> PathBuf {
        data_dir.join("reports")
    }

    pub fn feedback_db_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.feedback_db)
    }

    pub fn cursor_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join("learning_cursor.json")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Fuzzy matches must have a similarity strictly above this value
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,
    /// N-gram candidates must score strictly above this value
    #[serde(default = "default_ngram_threshold")]
    pub ngram_threshold: f64,
    /// Maximum approved records folded in per learning cycle
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_fuzzy_threshold() -> f64 {
    0.8
}

fn default_ngram_threshold() -> f64 {
    0.7
}

fn default_batch_size() -> usize {
    100
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: default_fuzzy_threshold(),
            ngram_threshold: default_ngram_threshold(),
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Auto-validator interval (minutes)
    #[serde(default = "default_validate_minutes")]
    pub validate_interval_minutes: u64,
    /// Continuous learner interval (minutes)
    #[serde(default = "default_learn_minutes")]
    pub learn_interval_minutes: u64,
    /// Full retrain interval (minutes)
    #[serde(default = "default_retrain_minutes")]
    pub retrain_interval_minutes: u64,
    /// Self-critique and auto-action interval (minutes)
    #[serde(default = "default_critique_minutes")]
    pub critique_interval_minutes: u64,
    /// Run every task once when the daemon starts
    #[serde(default = "default_true")]
    pub run_on_start: bool,
    /// Optional cron expression for evaluation runs (6-field, with seconds)
    #[serde(default)]
    pub evaluation_cron: Option<String>,
}

fn default_validate_minutes() -> u64 {
    60
}

fn default_learn_minutes() -> u64 {
    30
}

fn default_retrain_minutes() -> u64 {
    360
}

fn default_critique_minutes() -> u64 {
    120
}

fn default_true() -> bool {
    true
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            validate_interval_minutes: default_validate_minutes(),
            learn_interval_minutes: default_learn_minutes(),
            retrain_interval_minutes: default_retrain_minutes(),
            critique_interval_minutes: default_critique_minutes(),
            run_on_start: true,
            evaluation_cron: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Number of distinct recipes to evaluate
    #[serde(default = "default_sample_count")]
    pub sample_count: usize,
    /// Per-request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Pause between requests (milliseconds)
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,
    /// Random recipe endpoint
    #[serde(default = "default_source_url")]
    pub source_url: String,
    /// Attempts allowed per requested sample before giving up
    #[serde(default = "default_retry_factor")]
    pub retry_factor: usize,
}

fn default_sample_count() -> usize {
    100
}

fn default_request_timeout() -> u64 {
    5
}

fn default_pause_ms() -> u64 {
    100
}

fn default_source_url() -> String {
    "https://www.themealdb.com/api/json/v1/1/random.php".to_string()
}

fn default_retry_factor() -> usize {
    3
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            sample_count: default_sample_count(),
            request_timeout_secs: default_request_timeout(),
            pause_ms: default_pause_ms(),
            source_url: default_source_url(),
            retry_factor: default_retry_factor(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CritiqueConfig {
    /// Evaluation reports aggregated per critique
    #[serde(default = "default_evaluation_window")]
    pub evaluation_window: usize,
    /// Previous critiques scanned for trend comparison
    #[serde(default = "default_comparison_window")]
    pub comparison_window: usize,
    /// Summaries kept in the history file
    #[serde(default = "default_history_cap")]
    pub summary_history_cap: usize,
    /// Action execution records kept
    #[serde(default = "default_history_cap")]
    pub action_history_cap: usize,
}

fn default_evaluation_window() -> usize {
    10
}

fn default_comparison_window() -> usize {
    5
}

fn default_history_cap() -> usize {
    100
}

impl Default for CritiqueConfig {
    fn default() -> Self {
        Self {
            evaluation_window: default_evaluation_window(),
            comparison_window: default_comparison_window(),
            summary_history_cap: default_history_cap(),
            action_history_cap: default_history_cap(),
        }
    }
}

impl Config {
    /// Load configuration from the platform config file, creating it if absent
    pub fn load() -> Result<Self> {
        let config_path = config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .context("Failed to read config file")?;
        let config: Config = toml::from_str(&contents)
            .context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = config_path()?;
        let parent = config_path.parent()
            .context("Config path has no parent")?;

        std::fs::create_dir_all(parent)
            .context("Failed to create config directory")?;

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), EngineError> {
        for (name, value) in [
            ("engine.fuzzy_threshold", self.engine.fuzzy_threshold),
            ("engine.ngram_threshold", self.engine.ngram_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineError::Config(format!("{} must be within [0, 1], got {}", name, value)));
            }
        }
        if self.engine.batch_size == 0 {
            return Err(EngineError::Config("engine.batch_size must be positive".to_string()));
        }
        let intervals = [
            self.schedule.validate_interval_minutes,
            self.schedule.learn_interval_minutes,
            self.schedule.retrain_interval_minutes,
            self.schedule.critique_interval_minutes,
        ];
        if intervals.contains(&0) {
            return Err(EngineError::Config("schedule intervals must be positive".to_string()));
        }
        Ok(())
    }
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "adaptive-translation", "adaptive-translation")
        .context("Failed to get project directories")?;
    Ok(base.config_dir().join("config.toml"))
}

/// Get the data directory path
pub fn data_dir() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "adaptive-translation", "adaptive-translation")
        .context("Failed to get project directories")?;
    Ok(base.data_dir().to_path_buf())
}

/// Show current configuration
pub fn show_config(config: &Config) -> Result<()> {
    let contents = toml::to_string_pretty(config)
        .context("Failed to serialize config")?;
    println!("# {}", config_path()?.display());
    println!("{}", contents);
    Ok(())
}
