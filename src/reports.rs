//! Report storage
//!
//! Evaluation reports, critiques, the critique summary history and the
//! action execution history, stored as JSON documents under one directory:
//!
//! ```text
//! reports/
//!   evaluations/test_report_<timestamp>.json
//!   evaluations/latest_test_report.json
//!   critiques/self_critique_<timestamp>.json
//!   critiques/latest_self_critique.json
//!   critiques/summary_history.json
//!   actions_history.json
//! ```
//!
//! Timestamped names sort chronologically, so listings are plain name sorts.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::actions::ActionExecutionRecord;
use crate::critique::{CritiqueReport, CritiqueSummary};
use crate::evaluation::EvaluationReport;
use crate::memory::persistence::{read_json, write_json_atomic};

const EVALUATION_PREFIX: &str = "test_report_";
const LATEST_EVALUATION: &str = "latest_test_report.json";
const CRITIQUE_PREFIX: &str = "self_critique_";
const LATEST_CRITIQUE: &str = "latest_self_critique.json";
const SUMMARY_HISTORY: &str = "summary_history.json";
const ACTION_HISTORY: &str = "actions_history.json";

pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn evaluations_dir(&self) -> PathBuf {
        self.dir.join("evaluations")
    }

    fn critiques_dir(&self) -> PathBuf {
        self.dir.join("critiques")
    }

    /// Store an evaluation report and make it the latest
    pub fn save_evaluation(&self, report: &EvaluationReport) -> Result<PathBuf> {
        let dir = self.evaluations_dir();
        let path = unique_path(&dir, EVALUATION_PREFIX, report.timestamp);
        write_json_atomic(&path, report).context("Failed to save evaluation report")?;
        write_json_atomic(&dir.join(LATEST_EVALUATION), report)?;
        debug!("Saved evaluation report to {}", path.display());
        Ok(path)
    }

    /// Most recent evaluation reports, newest first
    pub fn recent_evaluations(&self, limit: usize) -> Result<Vec<EvaluationReport>> {
        load_recent(&self.evaluations_dir(), EVALUATION_PREFIX, limit)
    }

    pub fn latest_evaluation(&self) -> Result<Option<EvaluationReport>> {
        read_json(&self.evaluations_dir().join(LATEST_EVALUATION))
    }

    /// Store a critique, make it the latest and append its summary to the
    /// history, keeping at most `history_cap` summaries
    pub fn save_critique(&self, report: &CritiqueReport, history_cap: usize) -> Result<PathBuf> {
        let dir = self.critiques_dir();
        let path = unique_path(&dir, CRITIQUE_PREFIX, report.timestamp);
        write_json_atomic(&path, report).context("Failed to save critique report")?;
        write_json_atomic(&dir.join(LATEST_CRITIQUE), report)?;

        let mut history = self.summary_history()?;
        history.push(report.summary());
        if history.len() > history_cap {
            let excess = history.len() - history_cap;
            history.drain(..excess);
        }
        write_json_atomic(&dir.join(SUMMARY_HISTORY), &history)
            .context("Failed to save critique summary history")?;

        debug!("Saved critique report to {}", path.display());
        Ok(path)
    }

    /// Stored critiques, newest first
    pub fn previous_critiques(&self, limit: usize) -> Result<Vec<CritiqueReport>> {
        load_recent(&self.critiques_dir(), CRITIQUE_PREFIX, limit)
    }

    pub fn latest_critique(&self) -> Result<Option<CritiqueReport>> {
        read_json(&self.critiques_dir().join(LATEST_CRITIQUE))
    }

    /// Critique summaries, oldest first
    pub fn summary_history(&self) -> Result<Vec<CritiqueSummary>> {
        Ok(read_json(&self.critiques_dir().join(SUMMARY_HISTORY))?.unwrap_or_default())
    }

    /// Action execution records, oldest first
    pub fn load_action_history(&self) -> Result<Vec<ActionExecutionRecord>> {
        Ok(read_json(&self.dir.join(ACTION_HISTORY))?.unwrap_or_default())
    }

    pub fn save_action_history(&self, history: &[ActionExecutionRecord]) -> Result<()> {
        write_json_atomic(&self.dir.join(ACTION_HISTORY), &history)
            .context("Failed to save action history")
    }
}

/// `<prefix><timestamp>.json`, with a numeric suffix if the name is taken
fn unique_path(dir: &Path, prefix: &str, timestamp: DateTime<Utc>) -> PathBuf {
    let stamp = timestamp.format("%Y%m%dT%H%M%S%6f");
    let path = dir.join(format!("{}{}.json", prefix, stamp));
    if !path.exists() {
        return path;
    }
    (1..)
        .map(|n| dir.join(format!("{}{}_{}.json", prefix, stamp, n)))
        .find(|p| !p.exists())
        .unwrap_or(path)
}

/// Load up to `limit` documents named `<prefix>*.json`, newest first.
/// Unreadable documents are skipped.
fn load_recent<T: DeserializeOwned>(dir: &Path, prefix: &str, limit: usize) -> Result<Vec<T>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut names: Vec<String> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.starts_with(prefix) && name.ends_with(".json"))
        .collect();
    names.sort_unstable_by(|a, b| b.cmp(a));

    let mut documents = Vec::new();
    for name in names {
        if documents.len() >= limit {
            break;
        }
        match read_json::<T>(&dir.join(&name)) {
            Ok(Some(document)) => documents.push(document),
            Ok(None) => {}
            Err(e) => warn!("Skipping unreadable report {}: {:#}", name, e),
        }
    }
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::critique::Overall;
    use crate::evaluation::DomainCounts;
    use chrono::Duration;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn evaluation(timestamp: DateTime<Utc>, correct: u64) -> EvaluationReport {
        let totals = DomainCounts { correct, incorrect: 1, missing: 0 };
        EvaluationReport {
            timestamp,
            source: "test".to_string(),
            recipes: 1,
            by_domain: BTreeMap::new(),
            accuracy: totals.accuracy(),
            coverage: totals.coverage(),
            totals,
            examples: BTreeMap::new(),
        }
    }

    #[test]
    fn test_recent_evaluations_newest_first() {
        let dir = tempdir().unwrap();
        let store = ReportStore::new(dir.path());
        let base = Utc::now();
        for i in 0..4 {
            store.save_evaluation(&evaluation(base + Duration::seconds(i), i as u64)).unwrap();
        }

        let recent = store.recent_evaluations(3).unwrap();
        let corrects: Vec<u64> = recent.iter().map(|r| r.totals.correct).collect();
        assert_eq!(corrects, vec![3, 2, 1]);
        assert_eq!(store.latest_evaluation().unwrap().unwrap().totals.correct, 3);
    }

    #[test]
    fn test_same_timestamp_does_not_overwrite() {
        let dir = tempdir().unwrap();
        let store = ReportStore::new(dir.path());
        let now = Utc::now();
        store.save_evaluation(&evaluation(now, 1)).unwrap();
        store.save_evaluation(&evaluation(now, 2)).unwrap();

        let recent = store.recent_evaluations(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].totals.correct, 2);
    }

    #[test]
    fn test_corrupt_report_is_skipped() {
        let dir = tempdir().unwrap();
        let store = ReportStore::new(dir.path());
        store.save_evaluation(&evaluation(Utc::now(), 5)).unwrap();
        std::fs::write(dir.path().join("evaluations").join("test_report_99999999T000000000000.json"), "{").unwrap();

        let recent = store.recent_evaluations(10).unwrap();
        assert_eq!(recent.len(), 1);
    }

    #[test]
    fn test_summary_history_cap() {
        let dir = tempdir().unwrap();
        let store = ReportStore::new(dir.path());
        for i in 0..5 {
            let mut report = CritiqueReport::empty(Overall { accuracy: i as f64, ..Default::default() });
            report.timestamp = Utc::now() + Duration::seconds(i);
            store.save_critique(&report, 3).unwrap();
        }

        let history = store.summary_history().unwrap();
        let accuracies: Vec<f64> = history.iter().map(|s| s.accuracy).collect();
        assert_eq!(accuracies, vec![2.0, 3.0, 4.0]);
        assert_eq!(store.previous_critiques(10).unwrap().len(), 5);
        assert_eq!(store.latest_critique().unwrap().unwrap().overall.accuracy, 4.0);
    }

    #[test]
    fn test_empty_store() {
        let dir = tempdir().unwrap();
        let store = ReportStore::new(dir.path().join("missing"));
        assert!(store.recent_evaluations(5).unwrap().is_empty());
        assert!(store.latest_critique().unwrap().is_none());
        assert!(store.load_action_history().unwrap().is_empty());
    }
}
