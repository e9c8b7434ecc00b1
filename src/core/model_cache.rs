//! On-disk cache of known model names per backend.
//!
//! The file is a JSON object mapping a backend tag to a list of model names.
//! A missing or unreadable file is treated as an empty cache.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::core::config::{path_display, project_dirs};

pub const CACHE_FILE_NAME: &str = "models.json";

#[derive(Debug, Default)]
pub struct ModelCache {
    path: Option<PathBuf>,
    entries: BTreeMap<String, BTreeSet<String>>,
}

impl ModelCache {
    /// A cache that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Reads the cache at `path`, treating absence or corruption as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(path = %path_display(&path), error = %err, "ignoring corrupt model cache");
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };
        Self {
            path: Some(path),
            entries,
        }
    }

    pub fn default_path() -> PathBuf {
        project_dirs()
            .map(|dirs| dirs.cache_dir().join(CACHE_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(".azc-models.json"))
    }

    pub fn get(&self, backend: &str) -> Vec<String> {
        self.entries
            .get(backend)
            .map(|models| models.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Replaces the entry for `backend`. Returns whether anything changed;
    /// the file is only rewritten on change.
    pub fn set(&mut self, backend: &str, models: &[String]) -> std::io::Result<bool> {
        let next: BTreeSet<String> = models.iter().cloned().collect();
        if self.entries.get(backend) == Some(&next) {
            return Ok(false);
        }
        self.entries.insert(backend.to_string(), next);
        self.save()?;
        Ok(true)
    }

    fn save(&self) -> std::io::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let parent = path.parent().filter(|dir| !dir.as_os_str().is_empty());
        if let Some(dir) = parent {
            fs::create_dir_all(dir)?;
        }

        let contents = serde_json::to_string(&self.entries)?;
        let mut temp_file = match parent {
            Some(dir) => NamedTempFile::new_in(dir)?,
            None => NamedTempFile::new_in(".")?,
        };
        temp_file.write_all(contents.as_bytes())?;
        temp_file.as_file_mut().sync_all()?;
        temp_file.persist(path).map_err(|err| err.error)?;
        debug!(path = %path_display(path), "model cache written");
        Ok(())
    }
}
