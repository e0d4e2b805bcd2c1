//! Durable model documents
//!
//! One JSON document per (domain type, language) pair, named
//! `<model>_<lang>.json`. Writes go through a temp file in the same
//! directory and are renamed into place.

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::table::ModelTable;
use super::ModelKey;
use crate::types::{DomainType, Language};

const DOCUMENT_VERSION: u32 = 1;

/// On-disk shape of a model document
#[derive(Debug, Serialize, Deserialize)]
struct ModelDocument {
    version: u32,
    domain: DomainType,
    language: Language,
    updated_at: chrono::DateTime<chrono::Utc>,
    entries: BTreeMap<String, BTreeMap<String, u64>>,
}

/// Serialize `value` as pretty JSON into a synced temp file next to `path`
fn stage_json<T: Serialize>(path: &Path, value: &T) -> Result<NamedTempFile> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create directory {}", parent.display()))?;

    let mut temp = NamedTempFile::new_in(parent)
        .context("Failed to create temporary file")?;
    serde_json::to_writer_pretty(&mut temp, value)
        .context("Failed to serialize document")?;
    temp.flush().context("Failed to flush document")?;
    temp.as_file().sync_all().context("Failed to sync document")?;
    Ok(temp)
}

fn persist_temp(temp: NamedTempFile, path: &Path) -> Result<()> {
    temp.persist(path)
        .with_context(|| format!("Failed to persist {}", path.display()))?;
    Ok(())
}

/// Serialize `value` as pretty JSON and atomically replace `path`
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let temp = stage_json(path, value)?;
    persist_temp(temp, path)
}

/// Read a JSON document, `None` if the file does not exist
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(value))
}

/// A model document fully written to a temp file but not yet in place.
///
/// Dropping it without `commit` removes the temp file.
pub struct StagedModel {
    key: ModelKey,
    path: PathBuf,
    temp: NamedTempFile,
}

impl StagedModel {
    pub fn key(&self) -> ModelKey {
        self.key
    }

    /// Rename the document over the live one
    pub fn commit(self) -> Result<()> {
        let (domain, language) = self.key;
        persist_temp(self.temp, &self.path)
            .with_context(|| format!("Failed to save model {}_{}", domain.model_name(), language))
    }
}

/// Reads and writes model documents under a directory
#[derive(Debug, Clone)]
pub struct ModelPersistence {
    dir: PathBuf,
}

impl ModelPersistence {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Document path for a model
    pub fn path_for(&self, domain: DomainType, language: Language) -> PathBuf {
        self.dir.join(format!("{}_{}.json", domain.model_name(), language.code()))
    }

    /// Load every model document that exists.
    ///
    /// Unreadable documents are logged and treated as empty.
    pub fn load_all(&self) -> HashMap<ModelKey, ModelTable> {
        let mut tables = HashMap::new();
        for domain in DomainType::ALL {
            for language in Language::ALL {
                let path = self.path_for(domain, language);
                match read_json::<ModelDocument>(&path) {
                    Ok(Some(doc)) => {
                        let table = ModelTable::from_entries(doc.entries);
                        debug!("Loaded {} entries from {}", table.len(), path.display());
                        tables.insert((domain, language), table);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!("Ignoring unreadable model {}: {:#}", path.display(), e);
                    }
                }
            }
        }
        tables
    }

    /// Persist one model
    pub fn save(&self, domain: DomainType, language: Language, table: &ModelTable) -> Result<()> {
        self.stage(domain, language, table)?.commit()
    }

    /// Write one model to a temp file in the models directory
    pub fn stage(&self, domain: DomainType, language: Language, table: &ModelTable) -> Result<StagedModel> {
        let doc = ModelDocument {
            version: DOCUMENT_VERSION,
            domain,
            language,
            updated_at: chrono::Utc::now(),
            entries: table.entries().clone(),
        };
        let path = self.path_for(domain, language);
        let temp = stage_json(&path, &doc)
            .with_context(|| format!("Failed to save model {}_{}", domain.model_name(), language))?;
        Ok(StagedModel { key: (domain, language), path, temp })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let persistence = ModelPersistence::new(dir.path());

        let mut table = ModelTable::new();
        table.train("chicken", "poulet");
        table.train("chicken", "poulet");
        persistence.save(DomainType::Ingredient, Language::Fr, &table).unwrap();

        assert!(dir.path().join("ingredients_fr.json").exists());

        let loaded = persistence.load_all();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[&(DomainType::Ingredient, Language::Fr)], table);
    }

    #[test]
    fn test_corrupt_document_is_skipped() {
        let dir = tempdir().unwrap();
        let persistence = ModelPersistence::new(dir.path());
        std::fs::write(dir.path().join("units_es.json"), "{not json").unwrap();

        let loaded = persistence.load_all();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_dropped_stage_leaves_live_document() {
        let dir = tempdir().unwrap();
        let persistence = ModelPersistence::new(dir.path());
        let mut table = ModelTable::new();
        table.train("cup", "tasse");
        persistence.save(DomainType::Unit, Language::Fr, &table).unwrap();

        let mut replacement = ModelTable::new();
        replacement.train("cup", "bol");
        drop(persistence.stage(DomainType::Unit, Language::Fr, &replacement).unwrap());

        let loaded = persistence.load_all();
        assert_eq!(loaded[&(DomainType::Unit, Language::Fr)], table);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_commit_fails_when_target_is_a_directory() {
        let dir = tempdir().unwrap();
        let persistence = ModelPersistence::new(dir.path());
        std::fs::create_dir_all(persistence.path_for(DomainType::Unit, Language::Fr)).unwrap();

        let staged = persistence.stage(DomainType::Unit, Language::Fr, &ModelTable::new()).unwrap();
        let err = staged.commit().unwrap_err();
        assert!(format!("{:#}", err).contains("units_fr"));
    }

    #[test]
    fn test_atomic_write_replaces() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("value.json");
        write_json_atomic(&path, &vec![1, 2, 3]).unwrap();
        write_json_atomic(&path, &vec![4]).unwrap();
        let value: Option<Vec<u32>> = read_json(&path).unwrap();
        assert_eq!(value, Some(vec![4]));
    }
}
