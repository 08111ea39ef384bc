use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::HistoryError;

pub const DEFAULT_MAX_ENTRIES: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub filename: String,
    pub path: PathBuf,
    pub timestamp: DateTime<Utc>,
    pub url: String,
}

impl HistoryRecord {
    /// Record for a finished file, stamped now. Relative paths are made absolute.
    pub fn new(path: &Path, url: impl Into<String>) -> Self {
        let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Self {
            filename,
            path,
            timestamp: Utc::now(),
            url: url.into(),
        }
    }
}

/// Bounded append-only log of completed downloads, stored as a JSON array.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    file: PathBuf,
    max_entries: usize,
}

impl HistoryStore {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self::with_limit(file, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_limit(file: impl Into<PathBuf>, max_entries: usize) -> Self {
        Self {
            file: file.into(),
            max_entries: max_entries.max(1),
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    /// All records in insertion order. A missing or unreadable file is empty.
    pub fn load(&self) -> Vec<HistoryRecord> {
        let content = match fs::read_to_string(&self.file) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!("Failed to read history {:?}: {}", self.file, e);
                return Vec::new();
            }
        };

        match serde_json::from_str(&content) {
            Ok(records) => records,
            Err(e) => {
                warn!("Ignoring corrupt history {:?}: {}", self.file, e);
                Vec::new()
            }
        }
    }

    /// Newest first, at most `limit` records.
    pub fn newest_first(&self, limit: usize) -> Vec<HistoryRecord> {
        self.load().into_iter().rev().take(limit).collect()
    }

    /// Append a record and keep only the most recent entries.
    pub fn append(&self, record: HistoryRecord) -> Result<(), HistoryError> {
        let mut records = self.load();
        records.push(record);
        if records.len() > self.max_entries {
            let excess = records.len() - self.max_entries;
            records.drain(..excess);
        }
        self.persist(&records)
    }

    pub fn clear(&self) -> Result<(), HistoryError> {
        self.persist(&[])
    }

    // Write a sibling temp file, then rename it over the target.
    fn persist(&self, records: &[HistoryRecord]) -> Result<(), HistoryError> {
        let io_err = |source| HistoryError::Io {
            path: self.file.clone(),
            source,
        };

        if let Some(parent) = self.file.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let content = serde_json::to_string_pretty(records)?;
        let tmp = self.file.with_extension("json.tmp");

        let mut file = fs::File::create(&tmp).map_err(io_err)?;
        file.write_all(content.as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        drop(file);

        fs::rename(&tmp, &self.file).map_err(io_err)?;
        debug!("Wrote {} history records to {:?}", records.len(), self.file);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn record_uses_file_name() {
        let record = HistoryRecord::new(Path::new("/music/Song.mp3"), "https://youtu.be/x");
        assert_eq!(record.filename, "Song.mp3");
        assert!(record.path.is_absolute());
    }

    #[test]
    fn clear_empties_the_log() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::new(dir.path().join("history.json"));
        store
            .append(HistoryRecord::new(Path::new("/a.mp4"), "u"))
            .unwrap();
        assert_eq!(store.load().len(), 1);

        store.clear().unwrap();
        assert!(store.load().is_empty());
        assert!(!dir.path().join("history.json.tmp").exists());
    }
}
